mod error;
pub mod repl;

use error::Result;
use repl::Repl;

fn main() -> Result<()> {
    sfs::logging::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    Repl::new(&args)?.run();
    Ok(())
}
