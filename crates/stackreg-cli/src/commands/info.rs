use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use stackreg_core::io::stack_file::StackFileReader;

#[derive(Args)]
pub struct InfoArgs {
    /// Input .stk file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let reader = StackFileReader::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let header = &reader.header;

    println!("File:        {}", args.file.display());
    println!("Channel:     {}", header.channel);
    println!("Reference:   {}", header.reference_channel);
    println!("Units:       {}", header.units);
    println!("Frames:      {}", header.frame_count);
    println!("Dimensions:  {}x{}", header.width, header.height);
    println!("Version:     {}", header.version);

    let total_mb = (header.frame_byte_size() * header.frame_count()) as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    println!();
    println!("Missing samples per frame:");
    let pixels = header.height as usize * header.width as usize;
    for frame in reader.frames() {
        let frame = frame?;
        let missing = frame.missing_count();
        println!(
            "  {:>5}  {:>9}  ({:.1}%)",
            frame.index,
            missing,
            100.0 * missing as f64 / pixels as f64
        );
    }

    Ok(())
}
