use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub type TranslateFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Maps `(text, source, target)` to translated text. `source` may be `auto`.
pub trait Translate: Send + Sync {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source_lang: &'a str,
        target_lang: &'a str,
    ) -> TranslateFuture<'a>;
}

/// Pipes text through an external program.
///
/// `{source}` and `{target}` in the arguments are replaced per call. The text
/// goes to stdin; stdout (minus the trailing newline) is the translation.
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    program: String,
    args: Vec<String>,
}

impl CommandTranslator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Whitespace-separated command line; no shell quoting.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("translator command is empty"))?;
        Ok(Self::new(program, parts.collect()))
    }

    fn expand_args(&self, source_lang: &str, target_lang: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{source}", source_lang)
                    .replace("{target}", target_lang)
            })
            .collect()
    }
}

impl Translate for CommandTranslator {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source_lang: &'a str,
        target_lang: &'a str,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            let args = self.expand_args(source_lang, target_lang);
            debug!("running translator {} {:?}", self.program, args);
            let mut child = tokio::process::Command::new(&self.program)
                .args(&args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .with_context(|| format!("failed to start translator: {}", self.program))?;

            // Stdin is written while stdout drains.
            let stdin = child.stdin.take();
            let feed = async move {
                if let Some(mut stdin) = stdin
                    && let Err(err) = stdin.write_all(text.as_bytes()).await
                    && err.kind() != ErrorKind::BrokenPipe
                {
                    return Err(err);
                }
                Ok(())
            };
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output
                .with_context(|| format!("failed to wait for translator: {}", self.program))?;
            fed.with_context(|| "failed to write to translator")?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(anyhow!(
                    "translator exited with {}: {}",
                    output.status,
                    stderr.trim()
                ));
            }
            let stdout = String::from_utf8(output.stdout)
                .with_context(|| "translator output is not UTF-8")?;
            Ok(stdout.trim_end_matches(['\n', '\r']).to_string())
        })
    }
}

/// Fixed translations keyed by target language, then source text.
#[derive(Debug, Clone, Default)]
pub struct GlossaryTranslator {
    entries: HashMap<String, HashMap<String, String>>,
}

impl GlossaryTranslator {
    pub fn from_entries(entries: HashMap<String, HashMap<String, String>>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read glossary: {}", path.display()))?;
        let entries = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse glossary: {}", path.display()))?;
        Ok(Self { entries })
    }

    fn lookup(&self, text: &str, target_lang: &str) -> Option<String> {
        let table = self.entries.get(target_lang).or_else(|| {
            self.entries
                .iter()
                .find(|(lang, _)| lang.eq_ignore_ascii_case(target_lang))
                .map(|(_, table)| table)
        })?;
        if let Some(found) = table.get(text.trim()) {
            return Some(found.clone());
        }
        // Multi-line block text falls back to line-by-line entries.
        if text.contains('\n') {
            return text
                .split('\n')
                .map(|line| table.get(line.trim()).cloned())
                .collect::<Option<Vec<_>>>()
                .map(|lines| lines.join("\n"));
        }
        None
    }
}

impl Translate for GlossaryTranslator {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        _source_lang: &'a str,
        target_lang: &'a str,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            self.lookup(text, target_lang)
                .ok_or_else(|| anyhow!("no glossary entry for '{}' in {}", text, target_lang))
        })
    }
}
