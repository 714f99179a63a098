//! Kaffine CLI commands
//!
//! Each command opens the state directory, runs one core operation and
//! saves if it changed anything.

use anyhow::{Context, Result};
use clap::Subcommand;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use kaffine_core::catalog::FunctionDefinition;
use kaffine_core::function::LoadReport;
use kaffine_core::{FunctionManager, KaffinePaths};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Track a function catalog
    AddCatalog {
        /// Catalog URI (file://, http:// or https://)
        uri: String,
    },

    /// Stop tracking a function catalog
    RemoveCatalog {
        /// Catalog URI, as it appears in `kaffine list`
        uri: String,
    },

    /// Show tracked catalogs and installed functions
    List {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Search tracked catalogs for functions
    Search {
        /// Function name, optionally with group and version (e.g. acme/Logger@v1.0.0)
        name: String,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Install a function (a version pins it)
    Install {
        /// Function name, optionally with group and version (e.g. acme/Logger@v1.0.0)
        name: String,
    },

    /// Remove an installed function
    Remove {
        /// Function name, optionally with group
        name: String,
    },

    /// Refresh catalogs and upgrade unpinned functions
    Update,
}

impl Command {
    pub fn execute(self, paths: KaffinePaths) -> Result<()> {
        let mut manager = FunctionManager::open(paths.clone())
            .with_context(|| format!("Failed to load {}", paths.root().display()))?;
        report_load_problems(manager.load_report());

        match self {
            Command::AddCatalog { uri } => {
                manager.add_catalog(&uri)?;
                manager.save()?;
                println!("Successfully added catalog '{uri}'");
            }
            Command::RemoveCatalog { uri } => {
                let removal = manager.remove_catalog(&uri)?;
                manager.save()?;
                println!("Successfully removed catalog '{uri}'");
                for name in removal.orphaned {
                    eprintln!("warning: installed function '{name}' is no longer provided by any catalog");
                }
            }
            Command::List { json } => execute_list(&manager, json)?,
            Command::Search { name, json } => execute_search(&manager, &name, json)?,
            Command::Install { name } => {
                let installation = manager.install(&name)?;
                manager.save()?;

                let function = &installation.function;
                match installation.replaced {
                    Some(previous) if previous.version() != function.version() => println!(
                        "Successfully updated KRM Function '{}' (was {})",
                        function.short_name(),
                        previous.version().name
                    ),
                    _ => println!(
                        "Successfully added KRM Function '{}'",
                        function.short_name()
                    ),
                }
                if function.pinned() {
                    println!("Pinned to {}; `kaffine update` will not change it", function.version().name);
                }
            }
            Command::Remove { name } => {
                let removed = manager.remove(&name)?;
                manager.save()?;
                println!("Successfully removed KRM Function '{}'", removed.short_name());
            }
            Command::Update => {
                let report = manager.update()?;
                manager.save()?;

                for failed in &report.failed_catalogs {
                    eprintln!("warning: kept previous copy of '{}': {}", failed.uri, failed.reason);
                }
                for lost in &report.lost_catalogs {
                    eprintln!("warning: dropped catalog '{}': {}", lost.uri, lost.reason);
                }
                for name in &report.missing {
                    eprintln!("warning: '{name}' is no longer offered by any catalog");
                }
                for upgrade in &report.upgraded {
                    println!("  {}: {} -> {}", upgrade.name, upgrade.from, upgrade.to);
                }
                println!("Successfully updated catalogs and functions");
            }
        }

        Ok(())
    }
}

fn report_load_problems(report: &LoadReport) {
    for dropped in report.dropped_catalogs() {
        eprintln!("warning: dropped catalog '{}': {}", dropped.uri, dropped.reason);
    }
    for dropped in &report.dropped_dependencies {
        eprintln!("warning: dropped function '{}': {}", dropped.reference, dropped.reason);
    }
}

/// Table row for installed functions
#[derive(Tabled)]
struct InstalledRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Pinned")]
    pinned: String,
    #[tabled(rename = "Catalog")]
    catalog: String,
}

fn execute_list(manager: &FunctionManager, json_output: bool) -> Result<()> {
    let config = manager.config();

    if json_output {
        let installed: Vec<serde_json::Value> = manager
            .installed()
            .values()
            .map(|function| {
                serde_json::json!({
                    "name": function.group_name(),
                    "version": function.version().name,
                    "pinned": function.pinned(),
                    "catalog": manager.catalogs().catalog_for(&function.group_name()),
                })
            })
            .collect();

        let output = serde_json::json!({
            "catalogs": config.catalogs,
            "dependencies": config.dependencies.krm_functions,
            "installed": installed,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if config.catalogs.is_empty() {
        println!("No catalogs tracked. Add one with `kaffine add-catalog <uri>`.");
    } else {
        println!("Catalogs:");
        for uri in &config.catalogs {
            println!("  {uri}");
        }
    }

    if manager.installed().is_empty() {
        println!("\nNo functions installed.");
        return Ok(());
    }

    let rows: Vec<InstalledRow> = manager
        .installed()
        .values()
        .map(|function| InstalledRow {
            name: function.group_name(),
            version: function.version().name.clone(),
            pinned: (if function.pinned() { "yes" } else { "" }).to_string(),
            catalog: manager
                .catalogs()
                .catalog_for(&function.group_name())
                .unwrap_or("-")
                .to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("\nInstalled functions:\n");
    println!("{table}");
    Ok(())
}

/// Table row for search results
#[derive(Tabled)]
struct SearchResultRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Versions")]
    versions: String,
    #[tabled(rename = "Runtime")]
    runtime: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn execute_search(manager: &FunctionManager, name: &str, json_output: bool) -> Result<()> {
    let results = manager.search(name)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&search_json(&results))?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No functions found matching '{name}'.");
        return Ok(());
    }

    println!("Found {} function(s):\n", results.len());

    let rows: Vec<SearchResultRow> = results
        .iter()
        .map(|function| {
            let desc = function.short_description();
            let description = if desc.chars().count() > 50 {
                format!("{}...", desc.chars().take(47).collect::<String>())
            } else {
                desc.to_string()
            };

            SearchResultRow {
                name: function.group_name(),
                versions: function
                    .versions
                    .iter()
                    .map(|v| v.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                runtime: function
                    .highest_version()
                    .map(|v| v.runtime.to_string())
                    .unwrap_or_default(),
                description,
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
    Ok(())
}

fn search_json(results: &[FunctionDefinition]) -> Vec<serde_json::Value> {
    results
        .iter()
        .map(|function| {
            serde_json::json!({
                "name": function.group_name(),
                "group": function.group,
                "kind": function.kind(),
                "description": function.description,
                "publisher": function.publisher,
                "versions": function.versions.iter().map(|v| &v.name).collect::<Vec<_>>(),
            })
        })
        .collect()
}

#[cfg(test)]
mod commands_tests {
    use super::*;

    #[test]
    fn test_search_json_shape() {
        let catalog = kaffine_core::catalog::FunctionCatalog::from_yaml(
            r#"
apiVersion: config.kubernetes.io/v1alpha1
kind: KRMFunctionCatalog
spec:
  krmFunctions:
  - group: acme
    description: Logs resources
    publisher: acme.io
    names:
      kind: Logger
    versions:
    - name: v1.0.0
      runtime:
        container:
          image: ghcr.io/acme/logger:v1.0.0
"#,
        )
        .unwrap();

        let json = search_json(catalog.functions());
        assert_eq!(json.len(), 1);
        assert_eq!(json[0]["name"], "acme/Logger");
        assert_eq!(json[0]["versions"][0], "v1.0.0");
    }
}
