use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use cloudwaste_core::config::Config;
use cloudwaste_core::report::Report;
use cloudwaste_core::types::{Service, Severity};
use cloudwaste_core::{analyze_dir, AnalyzeOptions};

#[derive(Parser, Debug)]
#[command(
    name = "cloudwaste",
    version,
    about = "GCP billing waste gate (estimated)"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Analyze {
        /// Directory holding the fetch scripts' *_metrics.json files
        #[arg(long)]
        input: PathBuf,

        /// Prior report.json to compare total cost against
        #[arg(long)]
        baseline: Option<PathBuf>,

        #[arg(long)]
        budget_ratio: Option<f64>,

        #[arg(long)]
        strict: bool,

        /// Override the period computed from each snapshot's date window
        #[arg(long)]
        period_days: Option<u32>,

        /// Restrict the run to these service tags (repeatable)
        #[arg(long)]
        service: Vec<String>,

        #[arg(long, default_value = "cloudwaste-out")]
        out: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Exit 2 when any finding is at or above this severity
        #[arg(long)]
        fail_on: Option<FailOn>,
    },
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
    All,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FailOn {
    Low,
    Medium,
    High,
}

impl FailOn {
    fn threshold(self) -> Severity {
        match self {
            FailOn::Low => Severity::Low,
            FailOn::Medium => Severity::Medium,
            FailOn::High => Severity::High,
        }
    }
}

struct Style {
    bold: &'static str,
    dim: &'static str,
    red: &'static str,
    green: &'static str,
    yellow: &'static str,
    orange: &'static str,
    reset: &'static str,
}

const COLOR: Style = Style {
    bold: "\x1b[1m",
    dim: "\x1b[2m",
    red: "\x1b[31m",
    green: "\x1b[32m",
    yellow: "\x1b[33m",
    orange: "\x1b[38;5;208m",
    reset: "\x1b[0m",
};

const PLAIN: Style = Style {
    bold: "",
    dim: "",
    red: "",
    green: "",
    yellow: "",
    orange: "",
    reset: "",
};

fn style() -> &'static Style {
    if std::env::var_os("NO_COLOR").is_some() {
        &PLAIN
    } else {
        &COLOR
    }
}

fn main() -> std::process::ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    let res = match cli.cmd {
        Commands::Analyze {
            input,
            baseline,
            budget_ratio,
            strict,
            period_days,
            service,
            out,
            config,
            output_format,
            fail_on,
        } => {
            let cfg = load_config(config.as_deref());
            run_analyze(
                &input,
                baseline.as_deref(),
                budget_ratio.or(cfg.budget_ratio),
                strict || cfg.strict.unwrap_or(false),
                period_days.or(cfg.period_days),
                service,
                &cfg,
                &out,
                &output_format,
                fail_on,
            )
        }
    };

    match res {
        Ok(code) => code,
        Err(e) => {
            let s = style();
            eprintln!(
                "{}{red}error:{reset} {:#}",
                s.bold,
                e,
                red = s.red,
                reset = s.reset
            );
            std::process::ExitCode::from(1)
        }
    }
}

fn print_banner() {
    let s = style();
    eprintln!(
        "\n  {bold}cloud{reset}{orange}|{reset}{dim}waste{reset}  {dim}gcp billing waste gate{reset}\n",
        bold = s.bold,
        orange = s.orange,
        dim = s.dim,
        reset = s.reset,
    );
}

fn cost_color(cost: f64) -> &'static str {
    let s = style();
    if cost < 1.0 {
        s.green
    } else if cost < 100.0 {
        s.yellow
    } else {
        s.red
    }
}

fn severity_color(sev: &Severity) -> &'static str {
    let s = style();
    match sev {
        Severity::High => s.red,
        Severity::Medium => s.yellow,
        Severity::Low => s.dim,
    }
}

fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(p) => Config::load(p).unwrap_or_else(|e| {
            eprintln!(
                "{}{}warning:{} failed to load config {}: {}",
                style().bold,
                style().yellow,
                style().reset,
                p.display(),
                e
            );
            Config::default()
        }),
        None => Config::discover().unwrap_or_default(),
    }
}

/// CLI --service flags win over the config's service list; an empty result
/// means "analyze everything found".
fn resolve_services(cli_tags: &[String], cfg: &Config) -> anyhow::Result<Option<Vec<Service>>> {
    let tags = if cli_tags.is_empty() {
        cfg.services.as_slice()
    } else {
        cli_tags
    };
    if tags.is_empty() {
        return Ok(None);
    }
    let services = tags
        .iter()
        .map(|t| Service::parse(t).map_err(anyhow::Error::from))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Some(services))
}

fn findings_at_or_above(report: &Report, threshold: Severity) -> usize {
    report
        .services
        .iter()
        .flat_map(|s| s.findings.iter())
        .filter(|f| f.severity >= threshold)
        .count()
}

fn print_report(report: &Report, out: &Path) {
    let s = style();
    let cc = cost_color(report.totals.total_cost);

    eprintln!(
        "  {dim}total_cost        {reset}{cc}{bold}${:.2}{reset}",
        report.totals.total_cost,
        dim = s.dim,
        cc = cc,
        bold = s.bold,
        reset = s.reset
    );
    eprintln!(
        "  {dim}free_tier_savings {reset}{bold}${:.2}{reset}",
        report.totals.free_tier_savings,
        dim = s.dim,
        bold = s.bold,
        reset = s.reset
    );
    eprintln!();

    for svc in &report.services {
        let cc = cost_color(svc.breakdown.total_cost);
        eprintln!(
            "  {cc}{bold}${:<10.2}{reset}{}",
            svc.breakdown.total_cost,
            svc.service,
            cc = cc,
            bold = s.bold,
            reset = s.reset
        );
        for f in &svc.findings {
            let sc = severity_color(&f.severity);
            eprintln!(
                "    {sc}{:?}{reset}  {}",
                f.severity,
                f.pattern_id,
                sc = sc,
                reset = s.reset
            );
        }
    }

    for fail in &report.failures {
        eprintln!(
            "  {red}{bold}FAILED{reset}     {}  {dim}{}{reset}",
            fail.service,
            fail.error,
            red = s.red,
            bold = s.bold,
            dim = s.dim,
            reset = s.reset
        );
    }

    eprintln!();
    eprintln!(
        "  {dim}\u{2192} {}{reset}",
        out.join("report.json").display(),
        dim = s.dim,
        reset = s.reset
    );
    eprintln!(
        "  {dim}\u{2192} {}{reset}",
        out.join("report.md").display(),
        dim = s.dim,
        reset = s.reset
    );
    eprintln!();
}

fn run_analyze(
    input: &Path,
    baseline: Option<&Path>,
    budget_ratio: Option<f64>,
    strict: bool,
    period_days: Option<u32>,
    service_tags: Vec<String>,
    cfg: &Config,
    out: &Path,
    output_format: &OutputFormat,
    fail_on: Option<FailOn>,
) -> anyhow::Result<std::process::ExitCode> {
    let s = style();

    print_banner();

    let opts = AnalyzeOptions {
        strict,
        baseline_path: baseline.map(|p| p.to_path_buf()),
        budget_ratio,
        period_days,
        services: resolve_services(&service_tags, cfg)?,
        service_budgets: cfg.service_budgets.clone(),
        ..AnalyzeOptions::default()
    };

    let mut report = analyze_dir(input, opts)?;
    report.inputs.input_path = input.display().to_string();

    std::fs::create_dir_all(out).with_context(|| format!("create out dir {}", out.display()))?;

    let write_json = matches!(output_format, OutputFormat::Json | OutputFormat::All);
    let write_md = matches!(output_format, OutputFormat::Markdown | OutputFormat::All);

    if write_json {
        let json_path = out.join("report.json");
        let json = serde_json::to_vec_pretty(&report).context("serialize report json")?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("write {}", json_path.display()))?;
    }

    if write_md {
        let md_path = out.join("report.md");
        let md = report.to_markdown();
        std::fs::write(&md_path, md).with_context(|| format!("write {}", md_path.display()))?;
    }

    let total_findings: usize = report.services.iter().map(|s| s.findings.len()).sum();

    // Machine-parseable line on stdout
    println!(
        "total_cost={:.2} findings={} services={} failures={}",
        report.totals.total_cost,
        total_findings,
        report.services.len(),
        report.failures.len()
    );

    // Human-readable output on stderr
    print_report(&report, out);

    if !report.failures.is_empty() {
        eprintln!(
            "  {red}{bold}{} SERVICE(S) FAILED{reset}",
            report.failures.len(),
            red = s.red,
            bold = s.bold,
            reset = s.reset
        );
        eprintln!();
        return Ok(std::process::ExitCode::from(1));
    }

    if let Some(b) = &report.budget {
        if !b.pass {
            eprintln!(
                "  {red}{bold}BUDGET FAILED{reset}  {dim}({}){reset}",
                b.reason,
                red = s.red,
                bold = s.bold,
                dim = s.dim,
                reset = s.reset,
            );
            eprintln!();
            return Ok(std::process::ExitCode::from(2));
        }
    }

    if let Some(fail_on) = fail_on {
        let hits = findings_at_or_above(&report, fail_on.threshold());
        if hits > 0 {
            eprintln!(
                "  {red}{bold}FINDINGS GATE FAILED{reset}  {dim}({} finding(s) at or above {:?}){reset}",
                hits,
                fail_on.threshold(),
                red = s.red,
                bold = s.bold,
                dim = s.dim,
                reset = s.reset,
            );
            eprintln!();
            return Ok(std::process::ExitCode::from(2));
        }
    }

    eprintln!(
        "  {green}{bold}PASS{reset}",
        green = s.green,
        bold = s.bold,
        reset = s.reset
    );
    eprintln!();

    Ok(std::process::ExitCode::from(0))
}
