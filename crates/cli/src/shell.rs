use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tagtree::{to_json, Cursor, MergeCursor, MergeOptions, ValueStore};

/// One loaded document in the layer stack.
struct Layer {
    path: PathBuf,
    root: Cursor,
}

/// Result of executing one shell line.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Exit,
}

/// Layer stack plus the merged view over it.
///
/// Layers are listed lowest precedence first; the last loaded layer wins on
/// key conflicts.
pub struct Shell {
    layers: Vec<Layer>,
    options: MergeOptions,
    indent: usize,
}

impl Shell {
    pub fn new(options: MergeOptions, indent: usize) -> Self {
        Self {
            layers: Vec::new(),
            options,
            indent,
        }
    }

    /// Loads `path` as the new top layer.
    ///
    /// `.json` files are parsed; anything else is opened as a saved store.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let name = path.display().to_string();
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let store = if is_json {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", name))?;
            ValueStore::from_json(name, &text)?
        } else {
            ValueStore::open(path).with_context(|| format!("opening {}", name))?
        };

        let root = Cursor::root(&Rc::new(store));
        let kind = match root.kind() {
            Some(kind) if kind.is_mergeable() => kind,
            Some(kind) => bail!("layer root is a {}, expected a sequence or map", kind),
            None => bail!("layer is empty"),
        };
        if let Some(top) = self.layers.last() {
            if top.root.kind() != Some(kind) {
                bail!(
                    "layer root is a {}, but the stack holds {}s",
                    kind,
                    top.root.kind().map(|k| k.name()).unwrap_or("nothing")
                );
            }
        }

        tracing::debug!(path = %path.display(), %kind, "loaded layer");
        self.layers.push(Layer {
            path: path.to_path_buf(),
            root,
        });
        Ok(())
    }

    /// Removes the top layer.
    pub fn pop(&mut self) -> Option<PathBuf> {
        self.layers.pop().map(|layer| layer.path)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn set_merge_level(&mut self, level: u16) {
        self.options.merge_level = level;
    }

    /// Merged view over every layer; invalid when no layer is loaded.
    pub fn view(&self) -> Cursor {
        if self.layers.is_empty() {
            return Cursor::invalid();
        }
        let roots = self.layers.iter().map(|layer| layer.root.clone());
        MergeCursor::from_stack(roots, self.options).into_cursor()
    }

    /// Follows a dot-separated path from the merged view. Numeric segments
    /// index sequences; everything else is a map key.
    pub fn lookup(&self, path: &str) -> Cursor {
        let mut cursor = self.view();
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            cursor = match segment.parse::<usize>() {
                Ok(index) if cursor.is_sequence() => cursor.get_elem(index),
                _ => cursor.get_elem(segment),
            };
        }
        cursor
    }

    /// Flattens the merged view into one store file at `path`.
    pub fn save(&self, path: &Path) -> Result<usize> {
        let view = self.view();
        if !view.is_valid() {
            bail!("nothing loaded");
        }
        let store = ValueStore::from_cursor(path.display().to_string(), &view)?;
        store.save(path)?;
        Ok(store.len())
    }

    /// Runs one command line and returns what to print.
    pub fn execute(&mut self, line: &str) -> Outcome {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Outcome::Continue(String::new());
        };
        let arg = parts.next();

        let out = match cmd.to_uppercase().as_str() {
            "LOAD" => match arg {
                Some(path) => match self.load(Path::new(path)) {
                    Ok(()) => format!("OK ({} layers)", self.layer_count()),
                    Err(e) => format!("ERR load failed: {:#}", e),
                },
                None => "ERR usage: LOAD path".to_string(),
            },
            "POP" => match self.pop() {
                Some(path) => format!("OK popped {} ({} layers)", path.display(), self.layer_count()),
                None => "ERR no layers".to_string(),
            },
            "LAYERS" => {
                if self.layers.is_empty() {
                    "(empty)".to_string()
                } else {
                    self.layers
                        .iter()
                        .enumerate()
                        .map(|(i, layer)| {
                            let kind = layer.root.kind().map(|k| k.name()).unwrap_or("none");
                            format!("{}: {} ({})", i, layer.path.display(), kind)
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            "GET" => match arg {
                Some(path) => self.get(path),
                None => "ERR usage: GET path".to_string(),
            },
            "DUMP" => {
                let cursor = self.lookup(arg.unwrap_or(""));
                if cursor.is_valid() {
                    cursor.render(0, self.indent).trim_end().to_string()
                } else {
                    "(nil)".to_string()
                }
            }
            "SIZE" => {
                let cursor = self.lookup(arg.unwrap_or(""));
                match cursor.try_size() {
                    Ok(size) => size.to_string(),
                    Err(_) => "(nil)".to_string(),
                }
            }
            "KEYS" => {
                let cursor = self.lookup(arg.unwrap_or(""));
                if cursor.is_map() {
                    let keys: Vec<String> = cursor
                        .iter()
                        .filter_map(|pair| pair.get_key().map(str::to_owned))
                        .collect();
                    let count = keys.len();
                    let mut out = keys.join("\n");
                    if count > 0 {
                        out.push('\n');
                    }
                    out.push_str(&format!("({} keys)", count));
                    out
                } else {
                    "ERR not a map".to_string()
                }
            }
            "TYPE" => {
                let cursor = self.lookup(arg.unwrap_or(""));
                match cursor.kind() {
                    Some(kind) if cursor.is_merge() => format!("{} (merged)", kind),
                    Some(kind) => kind.to_string(),
                    None => "(nil)".to_string(),
                }
            }
            "DEPTH" => match arg.map(str::parse::<u16>) {
                Some(Ok(level)) => {
                    self.set_merge_level(level);
                    "OK".to_string()
                }
                _ => "ERR usage: DEPTH n".to_string(),
            },
            "SAVE" => match arg {
                Some(path) => match self.save(Path::new(path)) {
                    Ok(bytes) => format!("OK ({} bytes)", bytes),
                    Err(e) => format!("ERR save failed: {:#}", e),
                },
                None => "ERR usage: SAVE path".to_string(),
            },
            "EXIT" | "QUIT" => return Outcome::Exit,
            other => format!("unknown command: {}", other),
        };
        Outcome::Continue(out)
    }

    fn get(&self, path: &str) -> String {
        let cursor = self.lookup(path);
        if cursor.is_string() {
            return cursor.get_str("");
        }
        match to_json(&cursor) {
            Ok(value) => value.to_string(),
            Err(e) => {
                tracing::debug!(path, error = %e, "GET missed");
                "(nil)".to_string()
            }
        }
    }
}
