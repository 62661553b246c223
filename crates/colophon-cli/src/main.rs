//! Colophon CLI
//!
//! # Usage
//!
//! ```bash
//! # Check a record (JSON or YAML) against the built-in AACR2 rules
//! colophon check record.json --strict
//!
//! # Recover suggestions from an assistant's prose reply
//! colophon extract reply.txt
//!
//! # Gate an assistant reply against the request it answers
//! colophon guard --request request.json --response reply.txt
//!
//! # List the rules that apply to a tag
//! colophon rules --tag 245
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: `check` found punctuation problems
//! - 2: `guard` rejected the reply
//! - 10: Invalid input or internal error

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colophon_core::{
    AiRequest, Diagnostic, Diagnostics, EngineConfig, Field, Finding, GuardrailValidator, Patch, Record, Rule,
    RuleEngine, RulePack, TextExtractor,
};
use colophon_runtime::{interpret_reply, Suggestions};

#[derive(Parser, Debug)]
#[command(name = "colophon", version, about = "AACR2 punctuation checks and AI suggestion gating")]
struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check every field of a record
    Check {
        /// Record file (`{ "fields": [...] }` or a single field), JSON or YAML
        record: PathBuf,

        #[arg(long, help = "Rule pack to use instead of the built-in AACR2 pack")]
        rules: Option<PathBuf>,

        #[arg(long, help = "JSON override rules merged over the pack")]
        overrides: Option<PathBuf>,

        #[arg(long, help = "Report populated subfields no rule covers")]
        strict: bool,
    },

    /// Extract classification, subjects and confidence from free text
    Extract {
        /// Input file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,

        #[arg(long, default_value_t = 6, help = "Total subfield cap per subject heading (0 = unlimited)")]
        subject_cap: usize,
    },

    /// Validate an assistant reply against its request
    Guard {
        #[arg(long)]
        request: PathBuf,

        /// Raw reply text, JSON or prose
        #[arg(long)]
        response: PathBuf,

        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// List rules
    Rules {
        #[arg(long)]
        rules: Option<PathBuf>,

        #[arg(long, help = "Only rules that can apply to this tag")]
        tag: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(10)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Check {
            record,
            rules,
            overrides,
            strict,
        } => check(&record, rules.as_deref(), overrides.as_deref(), strict, cli.json),
        Commands::Extract { input, subject_cap } => extract(&input, subject_cap, cli.json),
        Commands::Guard {
            request,
            response,
            rules,
        } => guard(&request, &response, rules.as_deref(), cli.json),
        Commands::Rules { rules, tag } => list_rules(rules.as_deref(), tag.as_deref(), cli.json),
    }
}

fn load_pack(rules: Option<&Path>, overrides: Option<&Path>, diagnostics: &mut Diagnostics) -> Result<RulePack> {
    let pack = match rules {
        Some(path) => RulePack::from_file(path).with_context(|| format!("loading rules from {}", path.display()))?,
        None => RulePack::builtin().context("loading built-in rules")?,
    };

    match overrides {
        Some(path) => {
            let text = read_text(path)?;
            Ok(pack.with_overrides_json(&text, diagnostics))
        }
        None => Ok(pack),
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_record(path: &Path) -> Result<Record> {
    let text = read_text(path)?;
    let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
    let value: serde_json::Value = if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    };

    if value.get("fields").is_some() {
        return serde_json::from_value(value).context("decoding record");
    }
    let field: Field = serde_json::from_value(value).context("decoding field")?;
    Ok(Record::new(vec![field]))
}

#[derive(Serialize)]
struct CheckReport<'a> {
    findings: &'a [Finding],
    diagnostics: &'a [Diagnostic],
}

fn check(record: &Path, rules: Option<&Path>, overrides: Option<&Path>, strict: bool, json: bool) -> Result<ExitCode> {
    let mut diagnostics = Diagnostics::new();
    let pack = load_pack(rules, overrides, &mut diagnostics)?;
    let record = read_record(record)?;

    let engine = RuleEngine::new(&pack, EngineConfig::default());
    let result = engine.validate_record(&record, strict, &mut diagnostics);

    if json {
        let report = CheckReport {
            findings: &result.findings,
            diagnostics: diagnostics.entries(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for finding in &result.findings {
            println!(
                "{} {}${} [{}]: {}",
                finding.severity,
                finding.tag,
                finding.subfield,
                finding.code,
                finding.explanation()
            );
            if let Some(expected) = &finding.expected_value {
                println!("    {:?} -> {:?}", finding.current_value, expected);
            }
        }
        print_diagnostics(&diagnostics);
        if result.findings.is_empty() {
            println!("No punctuation problems found.");
        }
    }

    Ok(if result.findings.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn extract(input: &str, subject_cap: usize, json: bool) -> Result<ExitCode> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        buf
    } else {
        read_text(Path::new(input))?
    };

    let suggestions = TextExtractor::new(subject_cap).extract(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(rejection) = &suggestions.range_rejection {
        println!("{}", rejection);
    }
    if let Some(classification) = &suggestions.classification {
        println!("Classification: {}", classification);
    }
    for subject in &suggestions.subjects {
        println!("Subject ({}): {}", subject.tag, subject.to_heading_string());
    }
    if let Some(confidence) = suggestions.confidence_percent {
        println!("Confidence: {}%", confidence);
    }
    if suggestions.is_empty() {
        println!("Nothing recognised.");
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct GuardReport<'a> {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    patches: &'a [Patch],
    structured: bool,
    suggestions: &'a Suggestions,
    diagnostics: &'a [Diagnostic],
}

fn guard(request: &Path, response: &Path, rules: Option<&Path>, json: bool) -> Result<ExitCode> {
    let mut diagnostics = Diagnostics::new();
    let pack = load_pack(rules, None, &mut diagnostics)?;
    let request: AiRequest =
        serde_json::from_str(&read_text(request)?).with_context(|| format!("decoding {}", request.display()))?;
    let reply = read_text(response)?;

    let engine = RuleEngine::new(&pack, EngineConfig::default());
    let interpretation = interpret_reply(&reply, &request.request_id, colophon_core::extract::DEFAULT_SUBJECT_SUBFIELD_CAP);
    let checked = GuardrailValidator::new(&engine).validate_value(&request, &interpretation.value, &mut diagnostics);

    let (patches, reason) = match checked {
        Ok(patches) => (patches, None),
        Err(reason) => (Vec::new(), Some(reason.to_string())),
    };
    let accepted = reason.is_none();

    if json {
        let report = GuardReport {
            accepted,
            reason: reason.clone(),
            patches: &patches,
            structured: interpretation.structured,
            suggestions: &interpretation.suggestions,
            diagnostics: diagnostics.entries(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &reason {
            Some(reason) => println!("Rejected: {}", reason),
            None => {
                println!("Accepted ({} patch(es))", patches.len());
                for patch in &patches {
                    println!("    {}${} [{}] -> {:?}", patch.tag, patch.code, patch.position, patch.value);
                }
                if let Some(classification) = &interpretation.suggestions.classification {
                    println!("Classification: {}", classification);
                }
                for error in &interpretation.suggestions.field_errors {
                    println!("Field error ({}): {}", error.tag, error.message);
                }
            }
        }
        print_diagnostics(&diagnostics);
    }

    Ok(if accepted { ExitCode::SUCCESS } else { ExitCode::from(2) })
}

fn rule_applies_to_tag(rule: &Rule, tag: &str) -> bool {
    match (&rule.tag, &rule.tag_pattern) {
        (Some(t), _) => t == tag,
        (None, Some(pattern)) => Regex::new(pattern).map(|re| re.is_match(tag)).unwrap_or(false),
        (None, None) => true,
    }
}

fn list_rules(rules: Option<&Path>, tag: Option<&str>, json: bool) -> Result<ExitCode> {
    let mut diagnostics = Diagnostics::new();
    let pack = load_pack(rules, None, &mut diagnostics)?;
    let selected: Vec<&Rule> = pack
        .rules()
        .iter()
        .filter(|rule| tag.map_or(true, |t| rule_applies_to_tag(rule, t)))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} {} ({} rules)", pack.name, pack.version, pack.len());
    for rule in selected {
        let tag = rule
            .tag
            .as_deref()
            .or(rule.tag_pattern.as_deref())
            .unwrap_or("*");
        let codes: String = rule.subfields.iter().collect();
        println!(
            "  {:<24} {:<14} ${:<6} {}",
            rule.id,
            tag,
            if codes.is_empty() { "*" } else { codes.as_str() },
            rule.message
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.entries() {
        eprintln!("note: {} ({})", diagnostic.message, diagnostic.subject);
    }
}
