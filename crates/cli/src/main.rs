//! # CLI - tagtree layer shell
//!
//! A REPL over a stack of tagtree documents. Each loaded layer overlays the
//! ones below it; queries read the merged view. Reads commands from stdin and
//! prints results to stdout, so it works both interactively and scripted
//! (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! LOAD path      Push a layer (.json is parsed, anything else opened as a store file)
//! POP            Drop the top layer
//! LAYERS         List layers, lowest precedence first
//! GET path       Print the value at a dot path ("(nil)" when absent)
//! DUMP [path]    YAML-like dump of the merged view or a subtree
//! SIZE [path]    Child count
//! KEYS [path]    Keys of a map, in merged order
//! TYPE [path]    Node kind
//! DEPTH n        Set the merge depth
//! SAVE path      Flatten the merged view into a store file
//! EXIT / QUIT    Leave
//! ```
//!
//! ## Configuration
//!
//! See the `config` crate for the `TAGTREE_*` environment variables.
//!
//! ## Example
//!
//! ```text
//! $ TAGTREE_LAYERS=base.json:prod.json cargo run -p cli
//! tagtree shell (layers=2, depth=1, indent=2)
//! > GET server.port
//! 8443
//! > KEYS server
//! port
//! host
//! (2 keys)
//! > EXIT
//! bye
//! ```

mod shell;

use anyhow::Result;
use config::Config;
use shell::{Outcome, Shell};
use std::io::{self, BufRead, Write};
use tagtree::MergeOptions;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cfg = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log))
        .with_writer(io::stderr)
        .init();

    let options = MergeOptions {
        merge_level: cfg.merge_level,
        merge_sequences: cfg.merge_sequences,
        merge_maps: cfg.merge_maps,
    };
    let mut shell = Shell::new(options, cfg.indent);

    for path in &cfg.layers {
        if let Err(e) = shell.load(path) {
            println!("ERR load failed: {:#}", e);
        }
    }

    println!(
        "tagtree shell (layers={}, depth={}, indent={})",
        shell.layer_count(),
        cfg.merge_level,
        cfg.indent
    );
    println!("Commands: LOAD path | POP | LAYERS | GET path | DUMP [path] | SIZE [path]");
    println!("          KEYS [path] | TYPE [path] | DEPTH n | SAVE path | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        match shell.execute(&line) {
            Outcome::Continue(out) => {
                if !out.is_empty() {
                    println!("{}", out);
                }
            }
            Outcome::Exit => {
                println!("bye");
                break;
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
