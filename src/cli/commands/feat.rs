//! `axis feat` command - ballooned feature management

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{close_session, confirm, open_database, open_session, truncate_str};
use crate::cli::output::{effective_format, print_csv, print_structured, print_table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::codec;
use crate::entities::feature::{Feature, FeatureRecord, FeatureUpdate, NewFeature, FEATURE_COLUMNS};

#[derive(Subcommand, Debug)]
pub enum FeatCommands {
    /// List features in id order
    List(ListArgs),

    /// Show one feature with its results in every work order
    Show(ShowArgs),

    /// Add a feature for a region of the drawing
    Add(AddArgs),

    /// Change feature attributes (field=value ...)
    Set(SetArgs),

    /// Delete a feature and its results
    Rm(RmArgs),

    /// List the distinct measurement methods in use
    Methods,

    /// Set the balloon radius of every feature
    Radius(RadiusArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only features on this page
    #[arg(long, short = 'p')]
    pub page: Option<u32>,

    /// Filter by method (substring match, ignoring case)
    #[arg(long, short = 'm')]
    pub method: Option<String>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Feature ID
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// 1-based page number
    #[arg(long)]
    pub page: Option<u32>,

    /// Region left edge
    #[arg(long, allow_negative_numbers = true)]
    pub x: Option<f64>,

    /// Region top edge
    #[arg(long, allow_negative_numbers = true)]
    pub y: Option<f64>,

    /// Region width
    #[arg(long)]
    pub w: Option<f64>,

    /// Region height
    #[arg(long)]
    pub h: Option<f64>,

    /// View zoom when the region was picked
    #[arg(long)]
    pub zoom: Option<f64>,

    /// Measurement method
    #[arg(long, short = 'm', default_value = "")]
    pub method: String,

    /// Balloon offset from the region centre (x)
    #[arg(long, allow_negative_numbers = true)]
    pub bx: Option<f64>,

    /// Balloon offset from the region centre (y)
    #[arg(long, allow_negative_numbers = true)]
    pub by: Option<f64>,

    /// Balloon radius
    #[arg(long)]
    pub br: Option<f64>,

    /// Place the balloon in the region's top-left corner
    #[arg(long, conflicts_with_all = ["bx", "by"])]
    pub corner: bool,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Feature ID
    pub id: String,

    /// Assignments such as `method=CMM` or `nominal=12.5`
    #[arg(required = true)]
    pub assignments: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    /// Feature ID
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct RadiusArgs {
    /// New balloon radius
    pub radius: f64,
}

/// Run a feature subcommand
pub fn run(cmd: FeatCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        FeatCommands::List(args) => run_list(args, global),
        FeatCommands::Show(args) => run_show(args, global),
        FeatCommands::Add(args) => run_add(args, global),
        FeatCommands::Set(args) => run_set(args, global),
        FeatCommands::Rm(args) => run_rm(args, global),
        FeatCommands::Methods => run_methods(global),
        FeatCommands::Radius(args) => run_radius(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (mut db, _config) = open_database(global)?;
    let method_filter = args.method.as_deref().map(str::to_lowercase);

    let features: Vec<Feature> = db
        .features()
        .list()
        .into_diagnostic()?
        .into_iter()
        .filter(|f| args.page.is_none_or(|p| f.page == p))
        .filter(|f| {
            method_filter
                .as_deref()
                .is_none_or(|m| f.method.to_lowercase().contains(m))
        })
        .collect();

    if args.count {
        println!("{}", features.len());
        return Ok(());
    }

    let format = effective_format(global.output);
    if print_structured(&features, format)? {
        return Ok(());
    }

    if format == OutputFormat::Csv {
        // Same layout as the legacy balloons file
        let rows: Vec<Vec<String>> = features
            .iter()
            .map(|f| {
                FeatureRecord::from(f)
                    .values()
                    .iter()
                    .map(|v| v.to_string())
                    .collect()
            })
            .collect();
        return print_csv(&FEATURE_COLUMNS, &rows);
    }

    if features.is_empty() {
        println!("No features found.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = features
        .iter()
        .map(|f| {
            vec![
                style(&f.id).cyan().to_string(),
                f.page.to_string(),
                truncate_str(&f.method, 20),
                f.nominal.clone(),
                f.lsl.clone(),
                f.usl.clone(),
                codec::format_number(f.br, 2),
                f.username.clone(),
            ]
        })
        .collect();
    print_table(
        &["ID", "PAGE", "METHOD", "NOMINAL", "LSL", "USL", "RADIUS", "USER"],
        &rows,
    );
    println!();
    println!("{} feature(s)", style(features.len()).cyan());
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let (mut db, _config) = open_database(global)?;
    let snapshot = db
        .features()
        .snapshot(&args.id)
        .into_diagnostic()?
        .ok_or_else(|| miette::miette!("No feature found with id '{}'", args.id))?;

    if print_structured(&snapshot, effective_format(global.output))? {
        return Ok(());
    }

    let f = &snapshot.feature;
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&f.id).cyan());
    println!("{}: {}", style("Page").bold(), f.page);
    println!(
        "{}: x={} y={} w={} h={} (zoom {})",
        style("Region").bold(),
        codec::to_text(f.x),
        codec::to_text(f.y),
        codec::to_text(f.w),
        codec::to_text(f.h),
        codec::to_text(f.zoom)
    );
    println!(
        "{}: offset ({}, {}) radius {}",
        style("Balloon").bold(),
        codec::to_text(f.bx),
        codec::to_text(f.by),
        codec::to_text(f.br)
    );
    if !f.method.is_empty() {
        println!("{}: {}", style("Method").bold(), style(&f.method).yellow());
    }
    if f.tolerance_is_blank() {
        println!("{}: {}", style("Tolerance").bold(), style("not set").dim());
    } else {
        println!(
            "{}: {} [{} .. {}]",
            style("Tolerance").bold(),
            f.nominal,
            f.lsl,
            f.usl
        );
    }
    if !f.username.is_empty() {
        println!("{}: {}", style("Author").bold(), f.username);
    }
    println!("{}", style("─".repeat(60)).dim());

    if snapshot.results.is_empty() {
        println!("{}", style("No results recorded").dim());
    } else {
        println!("{}", style("Results:").bold());
        for row in &snapshot.results {
            println!(
                "  {} {} {}",
                style(&row.workorder).cyan(),
                row.result,
                style(
                    row.updated_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default()
                )
                .dim()
            );
        }
    }
    Ok(())
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = open_session(global)?;

    let mut input = NewFeature {
        page: args.page,
        x: args.x,
        y: args.y,
        w: args.w,
        h: args.h,
        zoom: args.zoom,
        method: args.method.trim().to_string(),
        bx: args.bx,
        by: args.by,
        br: args.br,
        ..Default::default()
    };
    if args.corner {
        if let (Some(page), Some(x), Some(y), Some(w), Some(h)) =
            (args.page, args.x, args.y, args.w, args.h)
        {
            let radius = args.br.unwrap_or(session.radius());
            let picked = NewFeature::picked(page, x, y, w, h, radius);
            input.bx = picked.bx;
            input.by = picked.by;
            input.br = picked.br;
        }
    }

    let feature = session.add_feature(input).into_diagnostic()?;
    close_session(session)?;

    if print_structured(&feature, effective_format(global.output))? {
        return Ok(());
    }
    println!(
        "{} Added feature {} on page {}",
        style("✓").green(),
        style(&feature.id).cyan(),
        feature.page
    );
    Ok(())
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let update = FeatureUpdate::from_assignments(&args.assignments).into_diagnostic()?;
    let mut session = open_session(global)?;

    if !session.update_feature(&args.id, &update).into_diagnostic()? {
        return Err(miette::miette!("No feature found with id '{}'", args.id));
    }
    close_session(session)?;

    let fields: Vec<&str> = update.columns().iter().map(|(name, _)| *name).collect();
    println!(
        "{} Updated {} ({})",
        style("✓").green(),
        style(&args.id).cyan(),
        fields.join(", ")
    );
    Ok(())
}

fn run_rm(args: RmArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = open_session(global)?;
    if session.feature(&args.id).is_none() {
        return Err(miette::miette!("No feature found with id '{}'", args.id));
    }

    let prompt = format!("Remove feature {} and all of its results?", args.id);
    if !confirm(&prompt, args.yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    session.delete_feature(&args.id).into_diagnostic()?;
    close_session(session)?;
    println!(
        "{} Deleted {} {}",
        style("✓").green(),
        style(&args.id).cyan(),
        style("(revert with `axis undo`)").dim()
    );
    Ok(())
}

fn run_methods(global: &GlobalOpts) -> Result<()> {
    let (mut db, _config) = open_database(global)?;
    let methods = db.features().methods().into_diagnostic()?;

    if print_structured(&methods, effective_format(global.output))? {
        return Ok(());
    }
    for method in methods {
        println!("{}", method);
    }
    Ok(())
}

fn run_radius(args: RadiusArgs, global: &GlobalOpts) -> Result<()> {
    if !(args.radius.is_finite() && args.radius > 0.0) {
        return Err(miette::miette!(
            "Balloon radius must be positive, got {}",
            args.radius
        ));
    }
    let mut session = open_session(global)?;
    let changed = session.set_radius(args.radius).into_diagnostic()?;
    close_session(session)?;

    println!(
        "{} Balloon radius set to {} ({} feature(s) changed)",
        style("✓").green(),
        codec::to_text(args.radius),
        changed
    );
    Ok(())
}
