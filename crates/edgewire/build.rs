// Renders man pages for `edgewire` and every visible subcommand into
// `$OUT_DIR/man`. Only `src/cli.rs` is compiled here, so it must not
// depend on anything beyond clap.

use std::fs;
use std::path::Path;

use clap::CommandFactory;

#[path = "src/cli.rs"]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = std::env::var_os("OUT_DIR").expect("cargo sets OUT_DIR");
    let man_dir = Path::new(&out_dir).join("man");
    fs::create_dir_all(&man_dir).expect("create man directory");

    render(&cli::Cli::command(), &man_dir);
}

fn render(cmd: &clap::Command, dir: &Path) {
    let name = cmd.get_name().to_owned();
    let mut page = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut page)
        .unwrap_or_else(|e| panic!("render man page for {name}: {e}"));

    let path = dir.join(format!("{name}.1"));
    fs::write(&path, page).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));

    for sub in cmd.get_subcommands().filter(|s| !s.is_hide_set()) {
        render(&sub.clone().name(format!("{name}-{}", sub.get_name())), dir);
    }
}
