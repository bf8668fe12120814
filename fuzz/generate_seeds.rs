//! Generate seed corpus for fuzzing

use std::fs;
use wrap_rs::{Archive, ArchiveOptions, CompressionLevel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = "fuzz/corpus/fuzz_archive_parse";
    fs::create_dir_all(corpus_dir)?;

    // Seeds are stored without the extension the parser requires; the
    // fuzz target renames its input.
    let scratch = tempfile::tempdir()?;
    let seed = |name: &str,
                build: &dyn Fn(&mut Archive) -> wrap_rs::Result<()>|
     -> Result<(), Box<dyn std::error::Error>> {
        let path = scratch.path().join(format!("{}.wrap", name));
        let mut archive = Archive::create_with(&path, &ArchiveOptions::new(name, 4))?;
        build(&mut archive)?;
        fs::copy(&path, format!("{}/seed_{}", corpus_dir, name))?;
        println!("Generated: seed_{}", name);
        Ok(())
    };

    seed("empty", &|_| Ok(()))?;

    seed("single", &|archive| {
        archive.emplace(b"Hello, World!", "test.txt", CompressionLevel::NONE, 0)?;
        Ok(())
    })?;

    seed("compressed", &|archive| {
        let text = "Lorem ipsum dolor sit amet. ".repeat(200);
        archive.emplace(text.as_bytes(), "dir/lorem.txt", CompressionLevel::DEFAULT, 0)?;
        archive.emplace(b"second", "dir/second.txt", CompressionLevel::FAST, 64)?;
        Ok(())
    })?;

    seed("vacated", &|archive| {
        archive.emplace(&[7u8; 300], "old.bin", CompressionLevel::NONE, 0)?;
        archive.remove("old.bin")?;
        archive.emplace(b"tiny", "new.txt", CompressionLevel::NONE, 0)?;
        Ok(())
    })?;

    Ok(())
}
