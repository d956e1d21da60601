use std::fs::File;
use std::io::{self, Read, Write};
use std::process::exit;
use std::sync::Arc;

use crate::error::Result;
use anyhow::{anyhow, Context};
use log::info;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sfs::{FileDisk, SimpleFs};

/// Bytes moved per read/write call by copyin, copyout and cat.
const CHUNK: usize = 16 * 1024;

const HELP: &str = "\
Commands are:
    format
    mount
    unmount
    debug
    create
    delete  <inode>
    getsize <inode>
    cat     <inode>
    copyin  <file> <inode>
    copyout <inode> <file>
    help
    quit
    exit";

pub struct Repl {
    rl: DefaultEditor,
    fs: SimpleFs,
    prompt: String,
}

impl Repl {
    /// `args` is `[image, nblocks]`; whatever is missing is asked for.
    pub fn new(args: &[String]) -> Result<Self> {
        println!("welcome to the SimpleFS shell!");
        let mut rl = DefaultEditor::new()?;
        let path = match args.first() {
            Some(path) => path.clone(),
            None => Self::ask(&mut rl, "input the path of the disk image> ")?,
        };
        let blocks = match args.get(1) {
            Some(blocks) => blocks.clone(),
            None => Self::ask(&mut rl, "input the number of blocks> ")?,
        };
        let blocks: u32 = blocks
            .parse()
            .map_err(|_| anyhow!("invalid number of blocks `{blocks}`"))?;

        println!("opened emulated disk image {path} with {blocks} blocks");
        let disk = FileDisk::open(&path, blocks)
            .with_context(|| format!("couldn't initialize {path}"))?;
        info!("image {path}: {blocks} blocks");
        Ok(Self {
            rl,
            fs: SimpleFs::new(Arc::new(disk)),
            prompt: " simplefs> ".to_owned(),
        })
    }

    fn ask(rl: &mut DefaultEditor, prompt: &str) -> Result<String> {
        match rl.readline(prompt) {
            Ok(line) => Ok(line.trim().to_owned()),
            Err(err) => Err(anyhow!("readline error: {}", err)),
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.rl.readline(&self.prompt) {
                Ok(line) => {
                    let _ = self.rl.add_history_entry(line.as_str());
                    if let Err(err) = self.exec(&line) {
                        println!("error: {}", err);
                    }
                }
                Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                    self.exit();
                }
                Err(err) => {
                    println!("readline error: {}", err);
                    exit(1);
                }
            }
        }
    }

    fn exec(&mut self, line: &str) -> Result<()> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(());
        };
        let args: Vec<&str> = words.collect();
        match command {
            "format" => {
                no_args(&args)?;
                self.format()
            }
            "mount" => {
                no_args(&args)?;
                self.mount()
            }
            "unmount" => {
                no_args(&args)?;
                self.unmount()
            }
            "debug" => {
                no_args(&args)?;
                self.debug()
            }
            "create" => {
                no_args(&args)?;
                self.create()
            }
            "delete" => {
                let [inumber] = take_args(&args)?;
                self.delete(parse_inumber(inumber)?)
            }
            "getsize" => {
                let [inumber] = take_args(&args)?;
                self.getsize(parse_inumber(inumber)?)
            }
            "cat" => {
                let [inumber] = take_args(&args)?;
                self.cat(parse_inumber(inumber)?)
            }
            "copyin" => {
                let [path, inumber] = take_args(&args)?;
                self.copyin(path, parse_inumber(inumber)?)
            }
            "copyout" => {
                let [inumber, path] = take_args(&args)?;
                self.copyout(parse_inumber(inumber)?, path)
            }
            "help" => {
                println!("{HELP}");
                Ok(())
            }
            "quit" | "exit" => {
                no_args(&args)?;
                self.exit()
            }
            _ => Err(anyhow!("unknown command `{command}`, type `help` for a list")),
        }
    }

    fn format(&mut self) -> Result<()> {
        self.fs
            .format()
            .map_err(|err| anyhow!("format failed: {err}"))?;
        println!("disk formatted.");
        Ok(())
    }

    fn mount(&mut self) -> Result<()> {
        self.fs
            .mount()
            .map_err(|err| anyhow!("mount failed: {err}"))?;
        println!("disk mounted.");
        Ok(())
    }

    fn unmount(&mut self) -> Result<()> {
        self.fs
            .unmount()
            .map_err(|err| anyhow!("unmount failed: {err}"))?;
        println!("disk unmounted.");
        Ok(())
    }

    fn debug(&self) -> Result<()> {
        print!("{}", self.fs.debug());
        Ok(())
    }

    fn create(&mut self) -> Result<()> {
        let inumber = self
            .fs
            .create()
            .map_err(|err| anyhow!("create failed: {err}"))?;
        println!("created inode {inumber}");
        Ok(())
    }

    fn delete(&mut self, inumber: u32) -> Result<()> {
        self.fs
            .delete(inumber)
            .map_err(|err| anyhow!("delete failed: {err}"))?;
        println!("inode {inumber} deleted.");
        Ok(())
    }

    fn getsize(&self, inumber: u32) -> Result<()> {
        let size = self
            .fs
            .getsize(inumber)
            .map_err(|err| anyhow!("getsize failed: {err}"))?;
        println!("inode {inumber} has size {size}");
        Ok(())
    }

    fn cat(&self, inumber: u32) -> Result<()> {
        let stdout = io::stdout();
        let total = self.copy_to(inumber, &mut stdout.lock())?;
        info!("cat inode {inumber}: {total} bytes");
        Ok(())
    }

    fn copyin(&mut self, path: &str, inumber: u32) -> Result<()> {
        let mut file = File::open(path).with_context(|| format!("couldn't open {path}"))?;
        let mut buf = vec![0u8; CHUNK];
        let mut offset = 0u32;
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let written = self
                .fs
                .write(inumber, &buf[..n], offset)
                .map_err(|err| anyhow!("write failed after {offset} bytes: {err}"))?;
            offset += written as u32;
            if written < n {
                println!("warning: only {written} of {n} bytes fit on the disk");
                break;
            }
        }
        println!("{offset} bytes copied");
        Ok(())
    }

    fn copyout(&self, inumber: u32, path: &str) -> Result<()> {
        let mut file = File::create(path).with_context(|| format!("couldn't create {path}"))?;
        let total = self.copy_to(inumber, &mut file)?;
        println!("{total} bytes copied");
        Ok(())
    }

    fn copy_to(&self, inumber: u32, out: &mut impl Write) -> Result<u32> {
        let mut buf = vec![0u8; CHUNK];
        let mut offset = 0u32;
        loop {
            let n = self
                .fs
                .read(inumber, &mut buf, offset)
                .map_err(|err| anyhow!("read failed: {err}"))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            offset += n as u32;
        }
        out.flush()?;
        Ok(offset)
    }

    fn exit(&mut self) -> ! {
        if self.fs.is_mounted() {
            let _ = self.fs.unmount();
        }
        println!("bye!");
        exit(0);
    }
}

fn no_args(args: &[&str]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("too many arguments"))
    }
}

fn take_args<'a, const N: usize>(args: &[&'a str]) -> Result<[&'a str; N]> {
    <[&str; N]>::try_from(args).map_err(|_| {
        if args.len() < N {
            anyhow!("missing arguments, expected {N}")
        } else {
            anyhow!("too many arguments, expected {N}")
        }
    })
}

fn parse_inumber(arg: &str) -> Result<u32> {
    arg.parse()
        .map_err(|_| anyhow!("`{arg}` is not a valid inode number"))
}
