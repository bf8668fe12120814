/// Basic example: create an archive, store a few files, replace one and read
/// everything back.
///
/// Run with: cargo run --example basic
use anyhow::{Context, Result};
use wrap_rs::{Archive, ArchiveOptions, CompressionLevel};

const ARCHIVE_PATH: &str = "example_basic.wrap";

fn main() -> Result<()> {
    println!("=== wrap-rs Basic Example ===\n");

    println!("1. Creating archive...");
    create_archive()?;

    println!("\n2. Reading from archive...");
    read_archive()?;

    std::fs::remove_file(ARCHIVE_PATH).ok();
    println!("\nExample complete!");
    Ok(())
}

fn create_archive() -> Result<()> {
    let options = ArchiveOptions::new("Basic Example", 8)
        .with_base_path("assets")
        .with_content_version(1);
    let mut archive = Archive::create_with(ARCHIVE_PATH, &options)
        .with_context(|| format!("creating {}", ARCHIVE_PATH))?;

    archive.emplace(
        b"This is a readme file for the basic example.",
        "readme.txt",
        CompressionLevel::NONE,
        0,
    )?;
    archive.emplace(
        br#"{"name": "Basic Example", "version": "1.0.0"}"#,
        "data/info.json",
        CompressionLevel::DEFAULT,
        0,
    )?;

    // Reserve room so later revisions can be rewritten in place
    archive.emplace(&[0u8; 1000], "binary.dat", CompressionLevel::SLOW, 4096)?;
    archive.emplace(&[1u8; 2000], "binary.dat", CompressionLevel::SLOW, 0)?;

    println!(
        "   Archive created: {} ({} of {} slots used)",
        ARCHIVE_PATH,
        archive.occupied_count(),
        archive.entry_count()
    );
    Ok(())
}

fn read_archive() -> Result<()> {
    let archive = Archive::open(ARCHIVE_PATH)?;
    println!(
        "   {} v{} (base path {:?})",
        archive.name(),
        archive.content_version(),
        archive.base_path()
    );

    println!("   Files in archive:");
    for path in archive.paths() {
        let entry = archive.entry_by_path(&path)?;
        println!(
            "     - {} ({} -> {} bytes, {})",
            path, entry.uncompressed_size, entry.compressed_size, entry.compression
        );
    }

    let readme = archive.read("readme.txt")?;
    println!("\n   readme.txt: {}", String::from_utf8_lossy(&readme));

    let info = archive.read("assets/data/info.json")?;
    println!("   data/info.json: {}", String::from_utf8_lossy(&info));
    Ok(())
}
