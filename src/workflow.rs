use crate::aggregate::{extract, AggregateOptions};
use crate::cli::{DiffArgs, ExtractArgs, PromptsArgs, SubmissionArgs};
use crate::config::{default_cache_dir, load_config_optional, validate_config, HarvestConfig};
use crate::diff::{diff_path, strip_untouched};
use crate::distance::Levenshtein;
use crate::matcher::MatchOptions;
use crate::notebook::Notebook;
use crate::output::{responses_path, write_json, write_notebook, ExtractionReport};
use crate::prompt::{compile, StopMarker};
use crate::source::{
    fetch_all, load_submissions_file, CachedSource, FetchedSubmission, HttpSource, LocationSource,
    Submission,
};
use crate::util::{preview, template_stem};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

const PREVIEW_BYTES: usize = 72;

pub fn run_extract(args: ExtractArgs) -> Result<()> {
    let mut config = resolve_config(&args.inputs)?;
    if let Some(threshold) = args.threshold {
        config.match_threshold = threshold;
    }
    let template = load_template(&args.template)?;
    let prompts = compile(&template);
    let submissions = collect_submissions(&args.inputs)?;
    let submission_count = submissions.len();
    let fetched = fetch_submissions(&config, submissions)?;

    let options = AggregateOptions {
        matching: MatchOptions {
            threshold: config.match_threshold,
            heading_prefix: &config.heading_prefix,
        },
        attribution: args.with_names,
        label_prefix: &config.label_prefix,
    };
    let mut extraction = extract(&Levenshtein, &prompts, &fetched, &options);

    let out_path = match &args.out {
        Some(path) => path.clone(),
        None => responses_path(&args.out_dir, &template_stem(&args.template)?, args.with_names),
    };
    write_notebook(&out_path, &template.with_blocks(std::mem::take(&mut extraction.blocks)))?;
    println!(
        "wrote {} ({} answers from {} submissions)",
        out_path.display(),
        extraction.kept,
        submission_count
    );

    if let Some(report_path) = &args.report {
        let report = ExtractionReport::new(
            &args.template,
            &out_path,
            &extraction,
            args.with_names,
            config.match_threshold,
            prompts.len(),
            submission_count,
        );
        write_json(report_path, &report)?;
        println!("wrote {}", report_path.display());
    }
    Ok(())
}

pub fn run_prompts(args: PromptsArgs) -> Result<()> {
    let template = load_template(&args.template)?;
    let prompts = compile(&template);
    if args.json {
        let text = serde_json::to_string_pretty(&prompts).context("serialize prompts")?;
        println!("{text}");
        return Ok(());
    }
    if prompts.is_empty() {
        println!("no questions found in {}", args.template.display());
        return Ok(());
    }
    println!(
        "{}: {} questions",
        template.title().unwrap_or("untitled template"),
        prompts.len()
    );
    for (idx, prompt) in prompts.iter().enumerate() {
        let stop = match &prompt.stop_marker {
            StopMarker::NextBlock => "next cell".to_string(),
            StopMarker::ToEnd => "end of notebook".to_string(),
            StopMarker::Marker(marker) => format!("before \"{}\"", preview(marker, PREVIEW_BYTES)),
        };
        let poll = if prompt.is_poll { " [poll]" } else { "" };
        println!(
            "{:>3}. \"{}\"{poll}\n     until {stop}",
            idx + 1,
            preview(&prompt.start_marker, PREVIEW_BYTES)
        );
    }
    Ok(())
}

pub fn run_diff(args: DiffArgs) -> Result<()> {
    let config = resolve_config(&args.inputs)?;
    let template = load_template(&args.template)?;
    let stem = template_stem(&args.template)?;
    let submissions = collect_submissions(&args.inputs)?;
    let fetched = fetch_submissions(&config, submissions)?;

    let mut written = 0usize;
    for FetchedSubmission {
        submission,
        notebook,
    } in &fetched
    {
        let Some(notebook) = notebook else {
            continue;
        };
        let stripped = strip_untouched(&template, notebook);
        let path = diff_path(&args.out_dir, &stem, &submission.id);
        write_notebook(&path, &stripped)?;
        tracing::debug!(
            submission = %submission.id,
            kept = stripped.blocks.len(),
            dropped = notebook.blocks.len() - stripped.blocks.len(),
            "wrote diff"
        );
        written += 1;
    }
    println!(
        "wrote {written} of {} submissions to {}",
        fetched.len(),
        args.out_dir.display()
    );
    Ok(())
}

fn resolve_config(inputs: &SubmissionArgs) -> Result<HarvestConfig> {
    let mut config = load_config_optional(inputs.config.as_deref())?;
    if let Some(workers) = inputs.workers {
        config.fetch_workers = workers;
    }
    if let Some(cache_dir) = &inputs.cache_dir {
        config.cache_dir = Some(cache_dir.clone());
    } else if inputs.cache && config.cache_dir.is_none() {
        config.cache_dir = Some(default_cache_dir()?);
    }
    validate_config(&config)?;
    Ok(config)
}

fn load_template(path: &Path) -> Result<Notebook> {
    let bytes = fs::read(path).with_context(|| format!("read template {}", path.display()))?;
    Notebook::from_slice(&bytes).with_context(|| format!("parse template {}", path.display()))
}

fn collect_submissions(inputs: &SubmissionArgs) -> Result<Vec<Submission>> {
    let mut submissions = Vec::new();
    if let Some(path) = &inputs.submissions_file {
        submissions.extend(load_submissions_file(path)?);
    }
    for entry in &inputs.submissions {
        submissions.push(Submission::parse(entry)?);
    }
    if submissions.is_empty() {
        return Err(anyhow!(
            "no submissions given; pass SUBMISSION arguments or --submissions-file"
        ));
    }
    Ok(submissions)
}

fn fetch_submissions(
    config: &HarvestConfig,
    submissions: Vec<Submission>,
) -> Result<Vec<FetchedSubmission>> {
    let http = HttpSource::new(config.http_timeout());
    let locations = match &config.cache_dir {
        Some(dir) => LocationSource::new(CachedSource::new(http, dir)),
        None => LocationSource::new(http),
    };
    fetch_all(&locations, submissions, config.fetch_workers)
}
