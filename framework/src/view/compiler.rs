//! Template compiler
//!
//! Compilation runs a fixed sequence of regex transforms over the template
//! source, rewriting each directive into a control-character marker, then
//! parses the marked text into a [`Program`]. Programs are cached on disk,
//! keyed by a hash of the source path, and recompiled whenever the source
//! is at least as new as the cached copy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::expr;
use super::program::{Branch, Op, Program, PROGRAM_VERSION};
use super::CompilationError;

/// Section name used to capture a child template's body for its layout.
pub(crate) const CONTENT_SECTION: &str = "__content";

const MARK_OPEN: char = '\u{0001}';
const MARK_SEP: char = '\u{0002}';
const MARK_CLOSE: char = '\u{0003}';

/// Compiles templates and manages the compiled-program cache directory.
pub struct Compiler {
    compiled_dir: PathBuf,
}

impl Compiler {
    pub fn new(compiled_dir: impl Into<PathBuf>) -> Result<Self, CompilationError> {
        let compiled_dir = compiled_dir.into();
        fs::create_dir_all(&compiled_dir).map_err(|e| CompilationError::Io {
            path: compiled_dir.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { compiled_dir })
    }

    /// Where the compiled program for `source` lives.
    ///
    /// The name is a hash of the source path, so nested view directories
    /// flatten into one cache directory without collisions.
    pub fn compiled_path(&self, source: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(source.display().to_string().as_bytes());
        self.compiled_dir
            .join(format!("{:x}.json", hasher.finalize()))
    }

    /// Ensure `source` has a fresh compiled program, returning its path.
    pub fn compile(&self, source: &Path) -> Result<PathBuf, CompilationError> {
        let compiled = self.compiled_path(source);
        if !self.is_expired(source, &compiled)? {
            return Ok(compiled);
        }

        let text = fs::read_to_string(source).map_err(|e| CompilationError::Io {
            path: source.display().to_string(),
            message: e.to_string(),
        })?;
        let program = self.compile_source(&text)?;

        // Write-then-rename keeps a concurrent reader from seeing a
        // half-written program.
        let staging = compiled.with_extension("json.tmp");
        let bytes = serde_json::to_vec(&program).map_err(|e| CompilationError::Io {
            path: compiled.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(&staging, bytes).map_err(|e| CompilationError::Io {
            path: staging.display().to_string(),
            message: e.to_string(),
        })?;
        fs::rename(&staging, &compiled).map_err(|e| CompilationError::Io {
            path: compiled.display().to_string(),
            message: e.to_string(),
        })?;

        debug!(source = %source.display(), compiled = %compiled.display(), "template compiled");
        Ok(compiled)
    }

    /// Load a compiled program from disk.
    pub fn load(&self, compiled: &Path) -> Result<Program, CompilationError> {
        let bytes = fs::read(compiled).map_err(|e| CompilationError::Io {
            path: compiled.display().to_string(),
            message: e.to_string(),
        })?;
        let program: Program =
            serde_json::from_slice(&bytes).map_err(|e| CompilationError::Corrupt {
                path: compiled.display().to_string(),
                message: e.to_string(),
            })?;
        if program.version != PROGRAM_VERSION {
            return Err(CompilationError::Corrupt {
                path: compiled.display().to_string(),
                message: format!("program version {} is not supported", program.version),
            });
        }
        Ok(program)
    }

    /// A compiled copy is stale when missing, or when the source is at least
    /// as new. Equal timestamps recompile: coarse filesystem clocks can hide
    /// a same-second edit behind an exact tie.
    fn is_expired(&self, source: &Path, compiled: &Path) -> Result<bool, CompilationError> {
        if !compiled.exists() {
            return Ok(true);
        }
        let source_mtime = mtime(source)?;
        let compiled_mtime = mtime(compiled)?;
        Ok(source_mtime >= compiled_mtime)
    }

    /// Transform template text into an executable program.
    pub fn compile_source(&self, source: &str) -> Result<Program, CompilationError> {
        let marked = apply_directive_passes(source);
        let tokens = tokenize(&marked);
        let mut parser = OpParser { tokens, pos: 0 };
        let (ops, terminator) = parser.block(&[])?;
        if let Some((name, _)) = terminator {
            return Err(CompilationError::Unbalanced { directive: name });
        }
        Ok(Program::new(ops))
    }
}

fn mtime(path: &Path) -> Result<SystemTime, CompilationError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| CompilationError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

fn marker(name: &str, args: &[&str]) -> String {
    let mut out = String::new();
    out.push(MARK_OPEN);
    out.push_str(name);
    for arg in args {
        out.push(MARK_SEP);
        out.push_str(arg);
    }
    out.push(MARK_CLOSE);
    out
}

struct Directives {
    comment: Regex,
    echo_triple: Regex,
    echo: Regex,
    echo_raw: Regex,
    extends: Regex,
    section: Regex,
    endsection: Regex,
    yields: Regex,
    include: Regex,
    r#if: Regex,
    elseif: Regex,
    r#else: Regex,
    endif: Regex,
    foreach: Regex,
    endforeach: Regex,
    r#for: Regex,
    endfor: Regex,
    r#while: Regex,
    endwhile: Regex,
    method: Regex,
    csrf: Regex,
}

fn directives() -> &'static Directives {
    static DIRECTIVES: OnceLock<Directives> = OnceLock::new();
    DIRECTIVES.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("static directive pattern");
        Directives {
            comment: re(r"(?s)\{\{--.*?--\}\}"),
            echo_triple: re(r"(?s)\{\{\{\s*(.+?)\s*\}\}\}"),
            echo: re(r"(?s)\{\{\s*(.+?)\s*\}\}"),
            echo_raw: re(r"(?s)\{!!\s*(.+?)\s*!!\}"),
            extends: re(r#"@extends\b\s*\(\s*['"]([^'"]*)['"]\s*\)"#),
            section: re(r#"@section\b\s*\(\s*['"]([^'"]*)['"]\s*\)"#),
            endsection: re(r"@endsection\b"),
            yields: re(r#"@yield\b\s*\(\s*['"]([^'"]*)['"]\s*\)"#),
            include: re(r#"@include\b\s*\(\s*['"]([^'"]*)['"]\s*(?:,\s*(.+?)\s*)?\)"#),
            // Lazy captures: the expression language has no parentheses,
            // so the first closing paren always ends the directive.
            r#if: re(r"@if\b\s*\((.*?)\)"),
            elseif: re(r"@elseif\b\s*\((.*?)\)"),
            r#else: re(r"@else\b"),
            endif: re(r"@endif\b"),
            foreach: re(r"@foreach\b\s*\((.*?)\)"),
            endforeach: re(r"@endforeach\b"),
            r#for: re(r"@for\b\s*\((.*?)\)"),
            endfor: re(r"@endfor\b"),
            r#while: re(r"@while\b\s*\((.*?)\)"),
            endwhile: re(r"@endwhile\b"),
            method: re(r#"@method\b\s*\(\s*['"]([^'"]*)['"]\s*\)"#),
            csrf: re(r"@csrf\b"),
        }
    })
}

/// Run the fixed directive passes, in order. Echo passes run before
/// directive passes so braces inside directive arguments are untouched,
/// and `@endforeach` is consumed before `@endfor` can see its prefix.
fn apply_directive_passes(source: &str) -> String {
    let d = directives();
    let one = |caps: &Captures, name: &str| marker(name, &[caps[1].trim()]);

    let text = d.comment.replace_all(source, "");
    let text = d
        .echo_triple
        .replace_all(&text, |c: &Captures| one(c, "echo_raw"));
    let text = d.echo.replace_all(&text, |c: &Captures| one(c, "echo"));
    let text = d
        .echo_raw
        .replace_all(&text, |c: &Captures| one(c, "echo_raw"));

    let mut extended = false;
    let text = d.extends.replace_all(&text, |c: &Captures| {
        extended = true;
        format!(
            "{}{}",
            marker("extends", &[c[1].trim()]),
            marker("startsection", &[CONTENT_SECTION])
        )
    });
    let mut text = text.into_owned();
    if extended {
        // The child's whole body becomes its layout's content section.
        text.push_str(&marker("stopsection", &[]));
    }

    let text = d
        .section
        .replace_all(&text, |c: &Captures| one(c, "startsection"));
    let text = d.endsection.replace_all(&text, marker("stopsection", &[]));
    let text = d.yields.replace_all(&text, |c: &Captures| one(c, "yield"));
    let text = d.include.replace_all(&text, |c: &Captures| {
        match c.get(2) {
            Some(data) => marker("include", &[c[1].trim(), data.as_str().trim()]),
            None => marker("include", &[c[1].trim()]),
        }
    });
    let text = d.r#if.replace_all(&text, |c: &Captures| one(c, "if"));
    let text = d.elseif.replace_all(&text, |c: &Captures| one(c, "elseif"));
    let text = d.r#else.replace_all(&text, marker("else", &[]));
    let text = d.endif.replace_all(&text, marker("endif", &[]));
    let text = d.foreach.replace_all(&text, |c: &Captures| one(c, "foreach"));
    let text = d
        .endforeach
        .replace_all(&text, marker("endforeach", &[]));
    let text = d.r#for.replace_all(&text, |c: &Captures| one(c, "for"));
    let text = d.endfor.replace_all(&text, marker("endfor", &[]));
    let text = d.r#while.replace_all(&text, |c: &Captures| one(c, "while"));
    let text = d.endwhile.replace_all(&text, marker("endwhile", &[]));
    let text = d.method.replace_all(&text, |c: &Captures| one(c, "method"));
    let text = d.csrf.replace_all(&text, marker("csrf", &[]));
    text.into_owned()
}

enum Tok {
    Text(String),
    Marker { name: String, args: Vec<String> },
}

fn tokenize(marked: &str) -> Vec<Tok> {
    let mut tokens = Vec::new();
    let mut rest = marked;
    while let Some(open) = rest.find(MARK_OPEN) {
        if open > 0 {
            tokens.push(Tok::Text(rest[..open].to_string()));
        }
        let after = &rest[open + 1..];
        let Some(close) = after.find(MARK_CLOSE) else {
            break;
        };
        let mut parts = after[..close].split(MARK_SEP);
        let name = parts.next().unwrap_or_default().to_string();
        let args = parts.map(str::to_string).collect();
        tokens.push(Tok::Marker { name, args });
        rest = &after[close + 1..];
    }
    if !rest.is_empty() {
        tokens.push(Tok::Text(rest.to_string()));
    }
    tokens
}

struct OpParser {
    tokens: Vec<Tok>,
    pos: usize,
}

type BlockEnd = Option<(String, Vec<String>)>;

impl OpParser {
    /// Parse ops until one of `terminators` (or end of input). Returns the
    /// terminator that stopped the block, if any.
    fn block(&mut self, terminators: &[&str]) -> Result<(Vec<Op>, BlockEnd), CompilationError> {
        let mut ops = Vec::new();
        while self.pos < self.tokens.len() {
            let index = self.pos;
            self.pos += 1;
            let (name, args) = match &self.tokens[index] {
                Tok::Text(text) => {
                    ops.push(Op::Literal(text.clone()));
                    continue;
                }
                Tok::Marker { name, args } => (name.clone(), args.clone()),
            };
            if terminators.contains(&name.as_str()) {
                return Ok((ops, Some((name, args))));
            }
            ops.push(self.op(&name, &args)?);
        }
        Ok((ops, None))
    }

    fn op(&mut self, name: &str, args: &[String]) -> Result<Op, CompilationError> {
        match name {
            "echo" | "echo_raw" => {
                let source = arg(args, 0);
                expr::parse(&source)?;
                Ok(Op::Echo {
                    expr: source,
                    raw: name == "echo_raw",
                })
            }
            "extends" => Ok(Op::Extends { view: arg(args, 0) }),
            "startsection" => Ok(Op::StartSection { name: arg(args, 0) }),
            "stopsection" => Ok(Op::StopSection),
            "yield" => Ok(Op::Yield { name: arg(args, 0) }),
            "include" => {
                let data = args.get(1).cloned();
                if let Some(source) = &data {
                    expr::parse(source)?;
                }
                Ok(Op::Include {
                    view: arg(args, 0),
                    data,
                })
            }
            "if" => self.if_chain(arg(args, 0)),
            "foreach" => {
                let (var, source) = loop_header(&arg(args, 0))?;
                expr::parse(&source)?;
                let body = self.loop_body("endforeach", "foreach")?;
                Ok(Op::Foreach {
                    var,
                    expr: source,
                    body,
                })
            }
            "for" => {
                let (var, range) = loop_header(&arg(args, 0))?;
                let (from, to) = range.split_once("..").ok_or_else(|| {
                    CompilationError::BadExpression {
                        expr: range.clone(),
                        reason: "expected a 'start..end' range".to_string(),
                    }
                })?;
                let (from, to) = (from.trim().to_string(), to.trim().to_string());
                expr::parse(&from)?;
                expr::parse(&to)?;
                let body = self.loop_body("endfor", "for")?;
                Ok(Op::For {
                    var,
                    from,
                    to,
                    body,
                })
            }
            "while" => {
                let cond = arg(args, 0);
                expr::parse(&cond)?;
                let body = self.loop_body("endwhile", "while")?;
                Ok(Op::While { cond, body })
            }
            "method" => Ok(Op::MethodField {
                verb: arg(args, 0).to_uppercase(),
            }),
            "csrf" => Ok(Op::CsrfField),
            // A closing marker outside its block.
            other => Err(CompilationError::Unbalanced {
                directive: other.to_string(),
            }),
        }
    }

    fn if_chain(&mut self, first_cond: String) -> Result<Op, CompilationError> {
        expr::parse(&first_cond)?;
        let mut branches = Vec::new();
        let mut otherwise = None;
        let mut cond = first_cond;
        loop {
            let (body, end) = self.block(&["elseif", "else", "endif"])?;
            match end {
                Some((name, args)) if name == "elseif" => {
                    branches.push(Branch { cond, body });
                    cond = arg(&args, 0);
                    expr::parse(&cond)?;
                }
                Some((name, _)) if name == "else" => {
                    branches.push(Branch { cond, body });
                    let (else_body, end) = self.block(&["endif"])?;
                    if end.is_none() {
                        return Err(CompilationError::Unbalanced {
                            directive: "if".to_string(),
                        });
                    }
                    otherwise = Some(else_body);
                    break;
                }
                Some(_) => {
                    branches.push(Branch { cond, body });
                    break;
                }
                None => {
                    return Err(CompilationError::Unbalanced {
                        directive: "if".to_string(),
                    })
                }
            }
        }
        Ok(Op::If {
            branches,
            otherwise,
        })
    }

    fn loop_body(&mut self, end: &str, directive: &str) -> Result<Vec<Op>, CompilationError> {
        let (body, terminator) = self.block(&[end])?;
        if terminator.is_none() {
            return Err(CompilationError::Unbalanced {
                directive: directive.to_string(),
            });
        }
        Ok(body)
    }
}

fn arg(args: &[String], index: usize) -> String {
    args.get(index).cloned().unwrap_or_default()
}

/// Split a loop header of the form `item in collection`.
fn loop_header(header: &str) -> Result<(String, String), CompilationError> {
    let (var, rest) = header
        .split_once(" in ")
        .ok_or_else(|| CompilationError::BadExpression {
            expr: header.to_string(),
            reason: "expected 'item in collection'".to_string(),
        })?;
    let var = var.trim().trim_start_matches('$');
    if var.is_empty() || !var.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CompilationError::BadExpression {
            expr: header.to_string(),
            reason: "invalid loop variable".to_string(),
        });
    }
    Ok((var.to_string(), rest.trim().to_string()))
}
