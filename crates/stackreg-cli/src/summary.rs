use std::path::Path;

use console::Style;
use stackreg_core::pipeline::config::RegistrationConfig;
use stackreg_core::pipeline::RegisteredChannels;

use crate::commands::batch::JobReport;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    ok: Style,
    failed: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            ok: Style::new().green().bold(),
            failed: Style::new().red().bold(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_registration_summary(config: &RegistrationConfig, input: &Path, output: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Stack Registration"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(18)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Reference"),
        s.value.apply_to(&config.reference_channel)
    );
    println!();

    println!("  {}", s.header.apply_to("Direct"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Motion"),
        s.method.apply_to(config.direct.motion)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(config.direct.max_iterations)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Min corr"),
        s.value.apply_to(config.direct.min_correlation)
    );
    println!();

    println!("  {}", s.header.apply_to("Features"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Budget"),
        s.value.apply_to(config.features.max_features)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bounds"),
        s.method.apply_to(config.preprocess.bounds)
    );
    println!();
}

pub fn print_job_result(registered: &RegisteredChannels, output: &Path) {
    let s = Styles::new();
    let registration = &registered.registration;
    let (h, w) = registration.output_dim();

    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(registration.frame_count())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output size"),
        s.value.apply_to(format!("{w}x{h}"))
    );
    if let Some(rect) = registration.crop {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Cropped at"),
            s.value.apply_to(format!("x={} y={}", rect.x, rect.y))
        );
    }
    if !registration.paths.is_empty() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Fallbacks"),
            s.value.apply_to(format!(
                "{} of {} pairs",
                registration.fallback_count(),
                registration.paths.len()
            ))
        );
    }
    println!();
    for channel in registered.channels.iter() {
        println!(
            "    {} {}",
            s.ok.apply_to("\u{2713}"),
            s.value.apply_to(&channel.name)
        );
    }
    println!();
    println!("Output saved to {}", s.path.apply_to(output.display()));
}

pub fn print_batch_summary(reports: &[JobReport]) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Batch Summary"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(13)));
    println!();
    println!(
        "  {:<32}{:>8}{:>10}{:>11}{:>12}",
        s.header.apply_to("Job"),
        s.header.apply_to("Frames"),
        s.header.apply_to("Channels"),
        s.header.apply_to("Fallbacks"),
        s.header.apply_to("Size")
    );

    for report in reports {
        let name = report.input.display().to_string();
        match &report.outcome {
            Ok(stats) => {
                let (h, w) = stats.output_dim;
                println!(
                    "  {:<32}{:>8}{:>10}{:>11}{:>12}",
                    s.ok.apply_to(name),
                    s.value.apply_to(stats.frames),
                    s.value.apply_to(stats.channels),
                    s.value.apply_to(stats.fallbacks),
                    s.value.apply_to(format!("{w}x{h}"))
                );
            }
            Err(message) => {
                println!("  {:<32}{}", s.failed.apply_to(name), s.label.apply_to(message));
            }
        }
    }

    let failed = reports.iter().filter(|r| r.outcome.is_err()).count();
    println!();
    println!(
        "  {} succeeded, {} failed",
        s.ok.apply_to(reports.len() - failed),
        s.failed.apply_to(failed)
    );
    println!();
}
