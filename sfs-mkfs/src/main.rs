use anyhow::{anyhow, Context, Result};
use clap::{App, Arg};
use log::{info, warn};
use std::{
    fs::{read_dir, File},
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};
use sfs::{FileDisk, SimpleFs};

fn main() -> Result<()> {
    sfs::logging::init();
    let matches = App::new("SimpleFS image builder")
        .arg(
            Arg::with_name("target")
                .short("t")
                .long("target")
                .takes_value(true)
                .required(true)
                .help("Disk image to create or overwrite"),
        )
        .arg(
            Arg::with_name("blocks")
                .short("b")
                .long("blocks")
                .takes_value(true)
                .default_value("1024")
                .help("Number of 4 KiB blocks in the image"),
        )
        .arg(
            Arg::with_name("source")
                .short("s")
                .long("source")
                .takes_value(true)
                .help("Directory whose regular files are copied in, one inode each"),
        )
        .get_matches();

    let target = matches
        .value_of("target")
        .ok_or_else(|| anyhow!("missing --target"))?;
    let blocks: u32 = matches
        .value_of("blocks")
        .unwrap_or("1024")
        .parse()
        .context("--blocks must be a positive integer")?;
    println!("target = {target}, blocks = {blocks}");

    let img = FileDisk::open(target, blocks).with_context(|| format!("couldn't open {target}"))?;
    let mut fs = SimpleFs::new(Arc::new(img));
    fs.format().map_err(|err| anyhow!("format failed: {err}"))?;
    fs.mount().map_err(|err| anyhow!("mount failed: {err}"))?;

    if let Some(source) = matches.value_of("source") {
        let mut files: Vec<PathBuf> = read_dir(source)
            .with_context(|| format!("couldn't read {source}"))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        for path in files {
            pack(&mut fs, &path)?;
        }
    }

    print!("{}", fs.debug());
    fs.unmount().map_err(|err| anyhow!("unmount failed: {err}"))?;
    Ok(())
}

fn pack(fs: &mut SimpleFs, path: &Path) -> Result<()> {
    let mut data = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut data))
        .with_context(|| format!("couldn't read {}", path.display()))?;

    let inumber = fs.create().map_err(|err| anyhow!("create failed: {err}"))?;
    let written = fs
        .write(inumber, &data, 0)
        .map_err(|err| anyhow!("writing {} failed: {err}", path.display()))?;
    if written < data.len() {
        warn!(
            "{}: only {written} of {} bytes fit",
            path.display(),
            data.len()
        );
    }
    info!("packed {} ({written} bytes)", path.display());
    println!("{} -> inode {inumber}", path.display());
    Ok(())
}
