//! Flattened device tree decoding.
//!
//! The boot loader hands the kernel a recursively serialized property
//! tree. Each node starts with two little-endian u32 counts (properties,
//! then children), followed by that many property records and then the
//! serialized child nodes in order. A property record is a fixed 32-byte
//! NUL-padded name, a u32 value size whose top bit flags the value as
//! boot-time replaceable, the value bytes, and padding up to the next
//! 4-byte boundary.

use indexmap::IndexMap;

use crate::error::Result;
use crate::reader::Cursor;
use crate::util::trimmed_str;

/// Width of the fixed property name field.
pub const PROP_NAME_LEN: usize = 32;
/// Top bit of the size field: the boot loader substitutes this value.
pub const PROP_REPLACE_FLAG: u32 = 0x8000_0000;

/// A single device tree property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// True when the boot loader replaces this value at boot time.
    pub replace: bool,
    /// Raw value bytes. Interpretation (string, integer, blob) is up to
    /// the consumer.
    pub value: Vec<u8>,
}

/// A device tree node: named properties plus child nodes, both kept in
/// the order the flattened encoding presented them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceTreeNode {
    /// Properties in encounter order. When the encoding repeats a name
    /// within one node, the later value wins.
    pub properties: IndexMap<String, Property>,
    /// Child nodes in encounter order.
    pub children: Vec<DeviceTreeNode>,
}

impl DeviceTreeNode {
    /// Decodes a flattened device tree starting at the front of `data`.
    ///
    /// Bytes after the root node's subtree are ignored; firmware images
    /// pad the blob out to a block boundary.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(data);
        Self::parse_node(&mut cur)
    }

    /// Decodes one node and its whole subtree, advancing the cursor.
    fn parse_node(cur: &mut Cursor<'_>) -> Result<Self> {
        let nprops = cur.read_u32_le()?;
        let nchildren = cur.read_u32_le()?;

        let mut node = DeviceTreeNode::default();
        for _ in 0..nprops {
            let raw_name: [u8; PROP_NAME_LEN] = cur.read_array()?;
            let name = trimmed_str(&raw_name).to_string();

            let raw_size = cur.read_u32_le()?;
            let replace = raw_size & PROP_REPLACE_FLAG != 0;
            let size = (raw_size & !PROP_REPLACE_FLAG) as usize;

            let value = cur.take(size)?.to_vec();
            cur.align_to(4)?;

            node.properties.insert(name, Property { replace, value });
        }
        for _ in 0..nchildren {
            node.children.push(Self::parse_node(cur)?);
        }
        Ok(node)
    }

    /// Returns the conventional `name` property as trimmed text.
    ///
    /// Well-formed trees carry one on every node, but the encoding does
    /// not require it.
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").map(|p| trimmed_str(&p.value))
    }

    /// Returns a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Total number of nodes in this subtree, counting this node.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(DeviceTreeNode::node_count)
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;

    use super::*;

    /// Serializes a node the way the boot loader flattens one. Assumes
    /// `out` is 4-byte aligned on entry, which holds for every call
    /// because all records are padded to 4 bytes.
    fn encode_into(node: &DeviceTreeNode, out: &mut Vec<u8>) {
        out.extend_from_slice(&(node.properties.len() as u32).to_le_bytes());
        out.extend_from_slice(&(node.children.len() as u32).to_le_bytes());
        for (name, prop) in &node.properties {
            let mut field = [0u8; PROP_NAME_LEN];
            field[..name.len()].copy_from_slice(name.as_bytes());
            out.extend_from_slice(&field);

            let mut size = prop.value.len() as u32;
            if prop.replace {
                size |= PROP_REPLACE_FLAG;
            }
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&prop.value);
            while out.len() % 4 != 0 {
                out.push(0);
            }
        }
        for child in &node.children {
            encode_into(child, out);
        }
    }

    fn encode(node: &DeviceTreeNode) -> Vec<u8> {
        let mut out = Vec::new();
        encode_into(node, &mut out);
        out
    }

    fn prop(replace: bool, value: &[u8]) -> Property {
        Property {
            replace,
            value: value.to_vec(),
        }
    }

    #[test]
    fn test_parse_single_node() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_le_bytes()); // properties
        data.extend_from_slice(&0u32.to_le_bytes()); // children

        let mut name_field = [0u8; PROP_NAME_LEN];
        name_field[..4].copy_from_slice(b"name");
        data.extend_from_slice(&name_field);
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(b"test");

        let mut value_field = [0u8; PROP_NAME_LEN];
        value_field[..5].copy_from_slice(b"value");
        data.extend_from_slice(&value_field);
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3, 4]);

        let node = DeviceTreeNode::parse(&data).unwrap();
        assert_eq!(node.name(), Some("test"));
        assert_eq!(node.children.len(), 0);
        let value = node.property("value").unwrap();
        assert!(!value.replace);
        assert_eq!(value.value, [1, 2, 3, 4]);
    }

    #[test]
    fn test_replace_flag_masked_out_of_size() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut name_field = [0u8; PROP_NAME_LEN];
        name_field[..6].copy_from_slice(b"serial");
        data.extend_from_slice(&name_field);
        data.extend_from_slice(&0x8000_0004u32.to_le_bytes());
        data.extend_from_slice(&[0xAA; 4]);

        let node = DeviceTreeNode::parse(&data).unwrap();
        let p = node.property("serial").unwrap();
        assert!(p.replace);
        assert_eq!(p.value.len(), 4);
    }

    #[test]
    fn test_child_consumes_exactly_its_bytes() {
        // Parent with two properties and one child: both property
        // records decode before the child subtree starts, and the
        // child's subtree must leave the cursor exactly at its end for
        // the sibling walk to stay in step.
        let mut root = DeviceTreeNode::default();
        root.properties.insert("name".into(), prop(false, b"root"));
        root.properties
            .insert("board-id".into(), prop(false, &[0x02, 0, 0, 0]));
        let mut child = DeviceTreeNode::default();
        child.properties.insert("name".into(), prop(false, b"cpu0"));
        child
            .properties
            .insert("reg".into(), prop(false, &[0, 0, 0, 1]));
        root.children.push(child);

        let data = encode(&root);
        let mut cur = Cursor::new(&data);
        let parsed = DeviceTreeNode::parse_node(&mut cur).unwrap();
        assert_eq!(cur.position(), data.len());
        assert_eq!(parsed.node_count(), 2);
        assert_eq!(parsed.properties.len(), 2);
        assert_eq!(parsed.name(), Some("root"));
        assert_eq!(
            parsed.property("board-id").unwrap().value,
            [0x02, 0, 0, 0]
        );
        assert_eq!(parsed.children[0].name(), Some("cpu0"));
    }

    #[test]
    fn test_round_trip() {
        let mut root = DeviceTreeNode::default();
        root.properties.insert("name".into(), prop(false, b"device-tree"));
        root.properties
            .insert("compatible".into(), prop(false, b"J274AP\0iPhone\0"));
        // Odd-length value exercises the padding path.
        root.properties
            .insert("model".into(), prop(false, b"J274AP"));
        root.properties
            .insert("random-seed".into(), prop(true, &[0u8; 16]));

        let mut chosen = DeviceTreeNode::default();
        chosen
            .properties
            .insert("name".into(), prop(false, b"chosen"));
        chosen
            .properties
            .insert("boot-args".into(), prop(true, b"-v debug=0x14e"));
        root.children.push(chosen);

        let mut memory = DeviceTreeNode::default();
        memory
            .properties
            .insert("name".into(), prop(false, b"memory"));
        memory
            .properties
            .insert("reg".into(), prop(false, &[0x00, 0x00, 0x00, 0x08]));
        root.children.push(memory);

        let data = encode(&root);
        let parsed = DeviceTreeNode::parse(&data).unwrap();
        assert_eq!(parsed, root);
        // Re-encoding the parse result reproduces the bytes, so order
        // and replace flags all survived.
        assert_eq!(encode(&parsed), data);
    }

    #[test]
    fn test_duplicate_property_keeps_later_value() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut name_field = [0u8; PROP_NAME_LEN];
        name_field[..3].copy_from_slice(b"key");
        data.extend_from_slice(&name_field);
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(b"old!");
        data.extend_from_slice(&name_field);
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(b"new!");

        let node = DeviceTreeNode::parse(&data).unwrap();
        assert_eq!(node.properties.len(), 1);
        assert_eq!(node.property("key").unwrap().value, b"new!");
    }

    #[test]
    fn test_truncated_value_underruns() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let mut name_field = [0u8; PROP_NAME_LEN];
        name_field[..3].copy_from_slice(b"big");
        data.extend_from_slice(&name_field);
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 8]);

        assert!(matches!(
            DeviceTreeNode::parse(&data),
            Err(Error::BufferUnderrun { .. })
        ));
    }

    #[test]
    fn test_missing_child_underruns() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        // Only one (empty) child follows.
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());

        assert!(matches!(
            DeviceTreeNode::parse(&data),
            Err(Error::BufferUnderrun { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut root = DeviceTreeNode::default();
        root.properties.insert("name".into(), prop(false, b"root"));
        let mut data = encode(&root);
        data.extend_from_slice(&[0u8; 64]);

        let parsed = DeviceTreeNode::parse(&data).unwrap();
        assert_eq!(parsed.name(), Some("root"));
    }
}
