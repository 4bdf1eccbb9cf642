//! Subcommand implementations

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_iam_utils::{
    collapse_policies, combine_policies, dedupe_policy, simplify_policy, AccessLevel,
    ActionCatalog, ActionOverrides, PolicyChecker, PolicyDocument, PolicyGenerator,
    ServiceReferenceDatabase, Simplifier, LIST_ONLY_LEVELS, READ_ONLY_LEVELS,
    READ_WRITE_LEVELS,
};
use serde::Serialize;

use crate::{CheckArgs, Cli, Commands, GenerateArgs};

pub fn run(cli: &Cli) -> Result<ExitCode> {
    let catalog = Arc::new(load_catalog(
        cli.overrides.as_deref(),
        cli.service_reference_dir.as_deref(),
    )?);

    match &cli.command {
        Commands::Equal { first, second } => {
            let checker = PolicyChecker::new(catalog);
            let equal = checker.policies_are_equal(&read_policy(first)?, &read_policy(second)?)?;
            Ok(answer(equal))
        }
        Commands::Check(args) => check(catalog, args),
        Commands::Combine { files } => {
            let policies = read_policies(files)?;
            print_json(&combine_policies(&policies))
        }
        Commands::Collapse { files } => {
            let policies = read_policies(files)?;
            print_json(&collapse_policies(&policies)?)
        }
        Commands::Dedupe { file } => print_json(&dedupe_policy(&read_policy(file)?)),
        Commands::Expand { file } => {
            let checker = PolicyChecker::new(catalog);
            print_json(&checker.expander().expand(&read_policy(file)?)?)
        }
        Commands::Minimize { file } => {
            let checker = PolicyChecker::new(catalog);
            print_json(&checker.expander().minimize(&read_policy(file)?)?)
        }
        Commands::Simplify {
            file,
            introduce_wildcards,
        } => {
            let mut policy = read_policy(file)?;
            if *introduce_wildcards {
                policy = Simplifier::new(catalog).introduce_wildcards(&policy)?;
            }
            print_json(&simplify_policy(&policy))
        }
        Commands::Generate(args) => generate(catalog, args),
        Commands::Lookup { action } => print_json(&catalog.lookup_qualified(action)?),
    }
}

fn load_catalog(overrides: Option<&Path>, service_reference_dir: Option<&Path>) -> Result<ActionCatalog> {
    let mut database = ServiceReferenceDatabase::embedded()?;
    if let Some(dir) = service_reference_dir {
        log::debug!("Loading service reference documents from {}", dir.display());
        database.add_dir(dir).with_context(|| {
            format!("Failed to load service reference directory {}", dir.display())
        })?;
    }

    let overrides = match overrides {
        Some(path) => {
            log::debug!("Loading action overrides from {}", path.display());
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read overrides file {}", path.display()))?;
            ActionOverrides::from_json(&json)
                .with_context(|| format!("Invalid overrides file {}", path.display()))?
        }
        None => ActionOverrides::embedded()?,
    };

    Ok(ActionCatalog::new(Arc::new(database), Arc::new(overrides)))
}

fn check(catalog: Arc<ActionCatalog>, args: &CheckArgs) -> Result<ExitCode> {
    let checker = PolicyChecker::new(catalog);
    let policy = read_policy(&args.file)?;

    let levels: Option<&[AccessLevel]> = if args.read_only {
        Some(READ_ONLY_LEVELS.as_slice())
    } else if args.list_only {
        Some(LIST_ONLY_LEVELS.as_slice())
    } else if args.read_write {
        Some(READ_WRITE_LEVELS.as_slice())
    } else if args.levels.is_empty() {
        None
    } else {
        Some(args.levels.as_slice())
    };

    if levels.is_none() && args.service.is_none() {
        anyhow::bail!(
            "Nothing to check: pass access levels (--level, --read-only, ...) or --service with --arn-type"
        );
    }

    let mut passed = match levels {
        Some(levels) => checker.has_only_access_levels(&policy, levels)?,
        None => true,
    };
    if let Some(service) = &args.service {
        let arn_types: Vec<&str> = args.arn_types.iter().map(String::as_str).collect();
        passed = passed && checker.has_only_arn_types(&policy, service, &arn_types)?;
    }
    Ok(answer(passed))
}

fn generate(catalog: Arc<ActionCatalog>, args: &GenerateArgs) -> Result<ExitCode> {
    let generator = PolicyGenerator::new(catalog);

    if args.full {
        let services: Vec<&str> = args.services.iter().map(String::as_str).collect();
        return print_json(&generator.generate_full_policy_for_service(&services));
    }

    let [service] = args.services.as_slice() else {
        anyhow::bail!("Multiple --service values are only supported with --full");
    };

    let policy = match &args.arn_type {
        Some(arn_type) => generator.generate_policy_for_service_arn_type(
            service,
            arn_type,
            &args.levels,
            args.include_service_wide_actions,
        )?,
        None => generator.generate_policy_for_service(
            service,
            &args.levels,
            !args.no_wildcard_verbs,
        )?,
    };
    print_json(&policy)
}

fn read_policy(path: &Path) -> Result<PolicyDocument> {
    let json = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read policy from stdin")?;
        buffer
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file {}", path.display()))?
    };

    PolicyDocument::from_json_str(&json)
        .with_context(|| format!("Invalid policy document {}", path.display()))
}

fn read_policies(paths: &[impl AsRef<Path>]) -> Result<Vec<PolicyDocument>> {
    paths.iter().map(|path| read_policy(path.as_ref())).collect()
}

fn print_json(value: &impl Serialize) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(ExitCode::SUCCESS)
}

fn answer(result: bool) -> ExitCode {
    println!("{}", result);
    if result {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
