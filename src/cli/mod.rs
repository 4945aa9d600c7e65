//! WT-021: CLI subcommands — init, validate, synth, diff, list, schema, completion.

use crate::core::{diff, output, parser, resolver, synth, types};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "ecsynth",
    version,
    about = "Synthesize CloudFormation templates for containerized ECS workloads"
)]
pub struct Cli {
    /// Log builder decisions to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter workload.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate workload.yaml without synthesizing
    Validate {
        /// Path to workload.yaml
        #[arg(short, long, default_value = "workload.yaml")]
        file: PathBuf,
    },

    /// Synthesize the CloudFormation template
    Synth {
        /// Path to workload.yaml
        #[arg(short, long, default_value = "workload.yaml")]
        file: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "cdk.out")]
        output: PathBuf,

        /// Print the template to stdout instead of writing files
        #[arg(long)]
        stdout: bool,

        /// Override app.region
        #[arg(long)]
        region: Option<String>,

        /// Override app.account
        #[arg(long)]
        account: Option<String>,
    },

    /// Show what a fresh synth would change in the written template
    Diff {
        /// Path to workload.yaml
        #[arg(short, long, default_value = "workload.yaml")]
        file: PathBuf,

        /// Output directory holding the previous synth
        #[arg(short, long, default_value = "cdk.out")]
        output: PathBuf,

        /// Exit non-zero when there are changes (for CI)
        #[arg(long)]
        fail_on_change: bool,
    },

    /// List resources in deploy order
    List {
        /// Path to workload.yaml
        #[arg(short, long, default_value = "workload.yaml")]
        file: PathBuf,
    },

    /// Print the JSON Schema of workload.yaml
    Schema,

    /// Generate shell completions
    Completion {
        /// Target shell
        shell: Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Synth {
            file,
            output,
            stdout,
            region,
            account,
        } => cmd_synth(&file, &output, stdout, region, account),
        Commands::Diff {
            file,
            output,
            fail_on_change,
        } => cmd_diff(&file, &output, fail_on_change),
        Commands::List { file } => cmd_list(&file),
        Commands::Schema => cmd_schema(),
        Commands::Completion { shell } => cmd_completion(shell),
    }
}

const STARTER_WORKLOAD: &str = r#"app:
  stack_name: MyStack
  construct_id: workloadConstruct
  region: us-east-1

vpc:
  name: constructVpc
  subnet: public

logger:
  enabled: true
  retention_days: one_month

registry:
  image: "tomiwatech/parser:amd64"
  type: public

container:
  name: constructContainer
  port: 6000

fargate_service:
  service_name: constructFargateService
  desired_count: 1
  assign_public_ip: true

cluster:
  name: workloadCluster
  type: fargate

expose_api: true
rollout_strategy: ecs
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("workload.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path).map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    std::fs::write(&config_path, STARTER_WORKLOAD)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized workload at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn print_warnings(config: &types::WorkloadConfig) {
    for w in parser::lint_config(config) {
        eprintln!("  WARN: {}", w);
    }
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);
    print_warnings(&config);

    if errors.is_empty() {
        println!(
            "OK: {} ({} cluster, {})",
            config.app.stack_name,
            config.cluster.cluster_type,
            if config.expose_api {
                "exposed via HTTP API"
            } else {
                "not exposed"
            }
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate a workload file, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<types::WorkloadConfig, String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

fn cmd_synth(
    file: &Path,
    out_dir: &Path,
    to_stdout: bool,
    region: Option<String>,
    account: Option<String>,
) -> Result<(), String> {
    let mut config = parse_and_validate(file)?;
    if region.is_some() {
        config.app.region = region;
    }
    if account.is_some() {
        config.app.account = account;
    }
    print_warnings(&config);

    let template = synth::synthesize(&config).map_err(|e| e.to_string())?;

    if to_stdout {
        let json = template.to_json().map_err(|e| format!("serialize error: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    let manifest = output::write_output(out_dir, &config.app, &template)?;
    println!(
        "Synthesized {} ({} resources, {} outputs)",
        manifest.stack_name,
        manifest.resource_count,
        template.outputs.len()
    );
    println!("  Template: {}", out_dir.join(&manifest.template_file).display());
    println!("  Hash:     {}", manifest.template_hash);
    Ok(())
}

fn cmd_diff(file: &Path, out_dir: &Path, fail_on_change: bool) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    let desired = synth::synthesize(&config).map_err(|e| e.to_string())?;
    let current = output::load_template(out_dir, &config.app.stack_name)?;
    let diff = diff::diff_templates(current.as_ref(), &desired).map_err(|e| format!("hash error: {}", e))?;

    print_diff(&config.app.stack_name, &diff);

    if fail_on_change && diff.has_changes() {
        return Err("template has changes".to_string());
    }
    Ok(())
}

/// Display a diff to stdout.
fn print_diff(stack_name: &str, diff: &diff::TemplateDiff) {
    println!("Stack: {} ({} resources)", stack_name, diff.changes.len());
    println!();
    for change in &diff.changes {
        if change.action == diff::ChangeAction::Unchanged {
            continue;
        }
        println!("  {} {} [{}]", change.action, change.description, change.resource_type);
    }
    if diff.outputs_changed {
        println!("  ~ outputs changed");
    }
    println!();
    println!(
        "Diff: {} to add, {} to change, {} to remove, {} unchanged.",
        diff.to_add, diff.to_modify, diff.to_remove, diff.unchanged
    );
}

fn cmd_list(file: &Path) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    let template = synth::synthesize(&config).map_err(|e| e.to_string())?;
    let order = resolver::build_deploy_order(&template).map_err(|e| e.to_string())?;

    println!("Deploy order ({} resources):", order.len());
    for (i, id) in order.iter().enumerate() {
        let resource_type = template
            .resources
            .get(id)
            .map(|r| r.resource_type.as_str())
            .unwrap_or("?");
        println!("  {:>3}. {} ({})", i + 1, id, resource_type);
    }
    Ok(())
}

fn cmd_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(types::WorkloadConfig);
    let json = serde_json::to_string_pretty(&schema).map_err(|e| format!("serialize error: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn cmd_completion(shell: Shell) -> Result<(), String> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "ecsynth", &mut std::io::stdout());
    Ok(())
}
