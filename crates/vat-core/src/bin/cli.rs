use chrono::{Datelike, Local};
use polars::prelude::{AnyValue, DataFrame};
use std::io::{self, Write};
use std::path::PathBuf;
use vat_core::{
    Contract, ContractKind, FileProjectStore, Project, ProjectSettings, ProjectStore, VatConfig,
    default_log_level, drafts_from_table, format_money, init_logging, read_import_csv,
};

fn cell_text(av: &AnyValue) -> String {
    match av {
        AnyValue::Null => String::new(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::Float64(v) => format!("{v:.2}"),
        AnyValue::String(s) => s.to_string(),
        _ => av.to_string(),
    }
}

fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let row = columns
            .iter()
            .map(|col| col.get(row_idx).map(|av| cell_text(&av)).unwrap_or_default())
            .collect::<Vec<_>>();
        cells.push(row);
    }

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.chars().count()).collect();
    for row in &cells {
        for (ci, value) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(value.chars().count());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let render_row = |values: &[String]| {
        let mut line = String::from("|");
        for (i, value) in values.iter().enumerate() {
            line.push(' ');
            line.push_str(value);
            line.push_str(&" ".repeat(widths[i].saturating_sub(value.chars().count())));
            line.push_str(" |");
        }
        line
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&col_names));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn print_help() {
    println!(
        "Commands:\n  help                                   Show this help\n  list                                   List saved projects (newest first)\n  new <name...>                          Create and open a project\n  open <name...>                         Open a saved project\n  show                                   Show the export table of the open project\n  add <name> <number> <total> <remaining>\n                                         Add a manual contract known by its cutoff remainder\n  contract <name> <total> <start_year> <duration>\n                                         Add a manual contract planned by tasks\n  task <contract> <name> <year> <cost> [pct]\n                                         Add a task to a contract\n  done <contract> <task_index>           Mark a task completed\n  rate <contract> <year> <rate>          Schedule a VAT rate change\n  unrate <contract> <year>               Drop rate changes for a year\n  breakdown <contract>                   Year-by-year VAT impact\n  remove <contract>                      Remove a contract\n  total                                  Recalculate additional VAT for the project\n  settings <current> <future> [years]    Update project VAT settings\n  projection <reference_year>            Project costs under current/future VAT\n  import <csv_path>                      Import contracts from a CSV sheet\n  export <csv_path>                      Export the project table as CSV\n  rename <name...>                       Rename the open project and move its folder\n  save                                   Save the open project\n  delete <name...>                       Delete a saved project\n  quit|exit                              Exit"
    );
}

fn rest_of_line<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join(" ")
}

fn print_breakdown(contract: &Contract) {
    match contract.yearly_breakdown() {
        Ok(rows) => {
            println!(
                "{:<6} {:>16} {:>16} {:>16} {:>8} {:>14} {:>6} {:>7}",
                "year", "planned", "completed", "remaining", "vat %", "impact", "tasks", "done %"
            );
            for row in rows {
                println!(
                    "{:<6} {:>16} {:>16} {:>16} {:>8.2} {:>14} {:>6} {:>7.1}",
                    row.year,
                    format_money(row.planned_cost),
                    format_money(row.completed_cost),
                    format_money(row.remaining_cost),
                    row.vat_rate,
                    format_money(row.vat_impact),
                    row.task_count,
                    row.completion_percentage
                );
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn show_project(project: &Project) {
    match project.export_view().to_dataframe() {
        Ok(df) => println!("{}", render_df_as_text_table(&df)),
        Err(e) => println!("Error rendering table: {}", e),
    }
}

fn parse_f64(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.replace(',', ".").parse::<f64>().ok())
}

fn parse_i32(value: Option<&str>) -> Option<i32> {
    value.and_then(|v| v.parse::<i32>().ok())
}

fn main() {
    let explicit_root = std::env::args().nth(1).map(PathBuf::from);
    let config = match explicit_root {
        Some(root) => VatConfig {
            projects_dir: root,
            ..VatConfig::default()
        },
        None => match VatConfig::load(VatConfig::default_path()) {
            Ok(config) => config,
            Err(e) => {
                println!("Config error ({}), using defaults.", e);
                VatConfig::default()
            }
        },
    };
    let defaults = config.project_settings().unwrap_or_default();
    let store = FileProjectStore::from_config(&config);
    if let Err(e) = init_logging(default_log_level(), &store.root().join(".logs")) {
        println!("Logging disabled: {}", e);
    }

    let this_year = Local::now().year();
    let mut current: Option<Project> = None;

    println!("VAT Impact Tool (CLI) - type 'help' for commands");
    println!("Projects folder: {}\n", store.root().display());

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "list" => match store.list_projects() {
                Ok(projects) if projects.is_empty() => println!("No projects."),
                Ok(projects) => {
                    for project in projects {
                        println!(
                            "{:<40} {}  contracts={}",
                            project.name(),
                            project.modified_at().format("%Y-%m-%d %H:%M"),
                            project.contract_count()
                        );
                    }
                }
                Err(e) => println!("Error: {}", e),
            },
            "new" => {
                let name = rest_of_line(parts);
                match store.create_project(&name, defaults) {
                    Ok(project) => {
                        println!("Created project '{}'.", project.name());
                        current = Some(project);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "open" => {
                let name = rest_of_line(parts);
                match store.load_project(&name) {
                    Ok(project) => {
                        println!("Opened project '{}'.", project.name());
                        show_project(&project);
                        current = Some(project);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "delete" => {
                let name = rest_of_line(parts);
                match store.delete_project(&name) {
                    Ok(()) => {
                        println!("Deleted project '{}'.", name);
                        let folder = vat_core::sanitize_project_name(&name);
                        if current.as_ref().is_some_and(|p| p.folder_name() == folder) {
                            current = None;
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            _ => {
                let Some(project) = current.as_mut() else {
                    println!("No project open. Use 'new <name>' or 'open <name>'.");
                    continue;
                };
                match cmd {
                    "show" => show_project(project),
                    "save" => match store.save_project(project) {
                        Ok(()) => println!("Project '{}' saved.", project.name()),
                        Err(e) => println!("Error: {}", e),
                    },
                    "rename" => {
                        let name = rest_of_line(parts);
                        match store.rename_project(project, &name) {
                            Ok(()) => println!("Project renamed to '{}'.", project.name()),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    "add" => {
                        let name = parts.next();
                        let number = parts.next();
                        let total = parse_f64(parts.next());
                        let remaining = parse_f64(parts.next());
                        match (name, number, total, remaining) {
                            (Some(name), Some(number), Some(total), Some(remaining)) => {
                                let added = Contract::new(
                                    name,
                                    total,
                                    this_year,
                                    1,
                                    project.settings().current_vat,
                                )
                                .and_then(|c| {
                                    c.with_number(number)
                                        .with_remaining_cost_at_cutoff(remaining)
                                });
                                match added {
                                    Ok(contract) => {
                                        project.add_contract(ContractKind::Manual, contract);
                                        println!("Contract '{}' added.", name);
                                    }
                                    Err(e) => println!("Error: {}", e),
                                }
                            }
                            _ => println!("Usage: add <name> <number> <total> <remaining>"),
                        }
                    }
                    "contract" => {
                        let name = parts.next();
                        let total = parse_f64(parts.next());
                        let start = parse_i32(parts.next());
                        let duration = parse_i32(parts.next());
                        match (name, total, start, duration) {
                            (Some(name), Some(total), Some(start), Some(duration)) => {
                                let added = project.new_contract(
                                    ContractKind::Manual,
                                    name,
                                    total,
                                    start,
                                    duration,
                                );
                                match added {
                                    Ok(_) => println!("Contract '{}' added.", name),
                                    Err(e) => println!("Error: {}", e),
                                }
                            }
                            _ => println!("Usage: contract <name> <total> <start_year> <duration>"),
                        }
                    }
                    "task" => {
                        let contract = parts.next();
                        let name = parts.next();
                        let year = parse_i32(parts.next());
                        let cost = parse_f64(parts.next());
                        let pct = parse_f64(parts.next()).unwrap_or(0.0);
                        match (contract, name, year, cost) {
                            (Some(contract), Some(name), Some(year), Some(cost)) => {
                                let added = project
                                    .contract_mut(contract)
                                    .map_err(|e| e.to_string())
                                    .and_then(|c| {
                                        c.add_task(name, year, cost)
                                            .map(|t| t.set_completion_percent(pct))
                                            .map_err(|e| e.to_string())
                                    });
                                match added {
                                    Ok(()) => println!("Task '{}' added to '{}'.", name, contract),
                                    Err(e) => println!("Error: {}", e),
                                }
                            }
                            _ => println!("Usage: task <contract> <name> <year> <cost> [pct]"),
                        }
                    }
                    "done" => {
                        let contract = parts.next();
                        let index = parts.next().and_then(|v| v.parse::<usize>().ok());
                        match (contract, index) {
                            (Some(contract), Some(index)) => {
                                let marked = project
                                    .contract_mut(contract)
                                    .map_err(|e| e.to_string())
                                    .and_then(|c| c.task_mut(index).map_err(|e| e.to_string()))
                                    .map(|t| t.mark_completed());
                                match marked {
                                    Ok(()) => println!("Task #{} marked completed.", index),
                                    Err(e) => println!("Error: {}", e),
                                }
                            }
                            _ => println!("Usage: done <contract> <task_index>"),
                        }
                    }
                    "rate" => {
                        let contract = parts.next();
                        let year = parse_i32(parts.next());
                        let rate = parse_f64(parts.next());
                        match (contract, year, rate) {
                            (Some(contract), Some(year), Some(rate)) => {
                                let added = project
                                    .contract_mut(contract)
                                    .map_err(|e| e.to_string())
                                    .and_then(|c| {
                                        c.add_vat_change(year, rate).map_err(|e| e.to_string())
                                    });
                                match added {
                                    Ok(()) => println!("VAT change {}% from {} added.", rate, year),
                                    Err(e) => println!("Error: {}", e),
                                }
                            }
                            _ => println!("Usage: rate <contract> <year> <rate>"),
                        }
                    }
                    "unrate" => {
                        let contract = parts.next();
                        let year = parse_i32(parts.next());
                        match (contract, year) {
                            (Some(contract), Some(year)) => match project.contract_mut(contract) {
                                Ok(c) => println!(
                                    "Removed {} VAT change(s) for {}.",
                                    c.remove_vat_changes_for_year(year),
                                    year
                                ),
                                Err(e) => println!("Error: {}", e),
                            },
                            _ => println!("Usage: unrate <contract> <year>"),
                        }
                    }
                    "breakdown" => match parts.next() {
                        Some(name) => match project.contract(name) {
                            Ok(contract) => print_breakdown(contract),
                            Err(e) => println!("Error: {}", e),
                        },
                        None => println!("Usage: breakdown <contract>"),
                    },
                    "remove" => match parts.next() {
                        Some(name) => match project.remove_contract(name) {
                            Ok(_) => println!("Contract '{}' removed.", name),
                            Err(e) => println!("Error: {}", e),
                        },
                        None => println!("Usage: remove <contract>"),
                    },
                    "total" => {
                        let total = project.calculate_total_vat_difference();
                        println!("Total additional VAT: {}", format_money(total));
                    }
                    "settings" => {
                        let current_vat = parse_f64(parts.next());
                        let future_vat = parse_f64(parts.next());
                        let years = parts
                            .next()
                            .and_then(|v| v.parse::<u32>().ok())
                            .unwrap_or(project.settings().projection_years);
                        match (current_vat, future_vat) {
                            (Some(current_vat), Some(future_vat)) => {
                                let updated = ProjectSettings {
                                    current_vat,
                                    future_vat,
                                    projection_years: years,
                                };
                                match project.set_settings(updated) {
                                    Ok(()) => println!(
                                        "Settings updated: current={}% future={}% years={}.",
                                        current_vat, future_vat, years
                                    ),
                                    Err(e) => println!("Error: {}", e),
                                }
                            }
                            _ => println!("Usage: settings <current> <future> [years]"),
                        }
                    }
                    "projection" => match parse_i32(parts.next()) {
                        Some(reference_year) => {
                            for row in project.projection(reference_year) {
                                println!(
                                    "{:<30} {} {:>6.2}% {:>16}",
                                    row.contract,
                                    row.year,
                                    row.vat_rate,
                                    format_money(row.cost_with_vat)
                                );
                            }
                        }
                        None => println!("Usage: projection <reference_year>"),
                    },
                    "import" => {
                        let path = rest_of_line(parts);
                        let imported = read_import_csv(&path)
                            .and_then(|rows| drafts_from_table(&rows))
                            .map_err(|e| e.to_string())
                            .and_then(|drafts| {
                                project
                                    .import_drafts(drafts, this_year)
                                    .map_err(|e| e.to_string())
                            });
                        match imported {
                            Ok(count) => println!("Imported {} contract(s).", count),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    "export" => {
                        let path = rest_of_line(parts);
                        match project.export_view().write_csv(&path) {
                            Ok(()) => println!("Exported to {}.", path),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Unknown command '{}'. Type 'help'.", cmd),
                }
            }
        }
    }
}
