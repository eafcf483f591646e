use std::fs;
use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory, relative to the workspace root
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::output_dir(args.out_dir)?;

    // pkgrel has no subcommands, so a single page covers every flag.
    let man = clap_mangen::Man::new(pkgrel::command());
    let mut page: Vec<u8> = Vec::new();
    man.render(&mut page)
        .map_err(|e| format!("render man page: {e}"))?;

    let path = out_dir.join(format!("{}.1", crate::BIN_NAME));
    fs::write(&path, page).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());

    Ok(())
}
