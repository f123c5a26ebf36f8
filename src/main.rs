//! ipswex - An Apple firmware bundle (IPSW) extractor.
//!
//! Decode the device tree, kernel cache or a boot-arguments dump from a
//! firmware bundle or a bare payload file.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use memmap2::Mmap;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ipswex::bootargs::BootArgs;
use ipswex::devicetree::{DeviceTreeNode, Property};
use ipswex::util::is_printable_ascii;
use ipswex::{im4p, IpswArchive, LzfseEngine, MachImage};

/// ZIP local file magic. Inputs that do not start with it are treated
/// as bare payload files.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// An Apple firmware bundle (IPSW) extractor.
#[derive(Parser, Debug)]
#[command(name = "ipswex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
    #[arg(short, long, default_value = "1", global = true)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode and print the device tree
    Devicetree {
        /// Firmware bundle (.ipsw) or bare device tree payload (.im4p)
        input: PathBuf,
    },

    /// Decode and summarize the kernel image
    Kernel {
        /// Firmware bundle (.ipsw) or bare kernel cache payload (.im4p)
        input: PathBuf,
    },

    /// Decompress a payload and write it to a file
    Extract {
        /// Firmware bundle (.ipsw) or bare payload file (.im4p)
        input: PathBuf,

        /// Which payload to extract
        #[arg(value_enum)]
        payload: PayloadKind,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decode a dumped boot-arguments block
    Bootargs {
        /// Raw memory dump starting at the boot-arguments block
        input: PathBuf,
    },
}

/// Payload kinds the extract command understands.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PayloadKind {
    /// Flattened device tree
    Devicetree,
    /// Kernel cache
    Kernel,
}

impl PayloadKind {
    fn codetag(self) -> &'static str {
        match self {
            PayloadKind::Devicetree => im4p::TAG_DEVICE_TREE,
            PayloadKind::Kernel => im4p::TAG_KERNEL,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    match cli.command {
        Commands::Devicetree { input } => cmd_devicetree(&input),
        Commands::Kernel { input } => cmd_kernel(&input),
        Commands::Extract {
            input,
            payload,
            output,
        } => cmd_extract(&input, payload, &output),
        Commands::Bootargs { input } => cmd_bootargs(&input),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Returns true when the input file starts with the ZIP magic.
fn is_bundle(path: &Path) -> Result<bool> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let mut magic = [0u8; 4];
    let n = file.read(&mut magic)?;
    Ok(n == magic.len() && &magic == ZIP_MAGIC)
}

/// Memory maps a bare payload file.
fn map_file(path: &Path) -> Result<Mmap> {
    let file =
        File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to memory map: {}", path.display()))?;
    Ok(mmap)
}

fn cmd_devicetree(input: &Path) -> Result<()> {
    let engine = LzfseEngine;
    let tree = if is_bundle(input)? {
        info!("Opening bundle: {}", input.display());
        IpswArchive::open(input)?.device_tree(&engine)?
    } else {
        let mmap = map_file(input)?;
        ipswex::extract_device_tree(&mmap, &engine)
            .with_context(|| format!("Failed to decode: {}", input.display()))?
    };

    info!("Decoded {} device tree nodes", tree.node_count());
    print_tree(&tree, 0);
    Ok(())
}

/// Prints a node the way the tree is usually eyeballed: name line,
/// properties, then children indented one level deeper.
fn print_tree(node: &DeviceTreeNode, depth: usize) {
    let indent = "    ".repeat(depth);
    println!("{indent}{} {{", node.name().unwrap_or("(unnamed)"));
    for (name, prop) in &node.properties {
        if name == "name" {
            continue;
        }
        print_property(&indent, name, prop);
    }
    for child in &node.children {
        print_tree(child, depth + 1);
    }
    println!("{indent}}}");
}

fn print_property(indent: &str, name: &str, prop: &Property) {
    let marker = if prop.replace { " (boot-replaced)" } else { "" };
    // Render as text when the value minus its NUL padding is printable,
    // otherwise dump hex.
    let end = prop.value.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let content = &prop.value[..end];
    if is_printable_ascii(content) {
        let text = String::from_utf8_lossy(content);
        println!("{indent}    {name}: {text:?}{marker}");
    } else {
        let hex: Vec<String> = prop.value.iter().map(|b| format!("{b:02x}")).collect();
        println!("{indent}    {name}: [{}]{marker}", hex.join(" "));
    }
}

fn cmd_kernel(input: &Path) -> Result<()> {
    let engine = LzfseEngine;
    let image = if is_bundle(input)? {
        info!("Opening bundle: {}", input.display());
        IpswArchive::open(input)?.kernel_cache(&engine)?
    } else {
        let mmap = map_file(input)?;
        ipswex::extract_kernel_cache(&mmap, &engine)
            .with_context(|| format!("Failed to decode: {}", input.display()))?
    };

    print_image(&image);
    Ok(())
}

fn print_image(image: &MachImage) {
    println!("{}", image.header);
    println!("Entry point: {:#x}", image.entry_point);
    println!("\nSegments:");
    for seg in &image.segments {
        println!("  {}", seg.command);
        for sect in &seg.sections {
            println!("      {sect}");
        }
    }
}

fn cmd_extract(input: &Path, payload: PayloadKind, output: &Path) -> Result<()> {
    let engine = LzfseEngine;
    let data = if is_bundle(input)? {
        info!("Opening bundle: {}", input.display());
        let mut ipsw = IpswArchive::open(input)?;
        let raw = match payload {
            PayloadKind::Devicetree => ipsw.device_tree_payload()?,
            PayloadKind::Kernel => ipsw.kernel_cache_payload()?,
        };
        ipswex::extract_payload(&raw, payload.codetag(), &engine)?
    } else {
        let mmap = map_file(input)?;
        ipswex::extract_payload(&mmap, payload.codetag(), &engine)
            .with_context(|| format!("Failed to decode: {}", input.display()))?
    };

    fs::write(output, &data)
        .with_context(|| format!("Failed to write: {}", output.display()))?;
    info!("Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}

fn cmd_bootargs(input: &Path) -> Result<()> {
    let mmap = map_file(input)?;
    let args = BootArgs::parse(&mmap)
        .with_context(|| format!("Failed to decode: {}", input.display()))?;
    println!("{args}");
    Ok(())
}
