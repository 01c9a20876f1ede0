//! Command-line translator: reads a COLLADA or Wavefront OBJ file and
//! writes the scene-graph JSON envelope to stdout or a file.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use sceneport_core::collada::{parse_document, ParseOptions, ParseParams};
use sceneport_core::{parse_obj, ParsedAsset};

struct Args {
    input: String,
    output: Option<String>,
    base_id: Option<String>,
    options: ParseOptions,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args()?;
    let params = build_params(&args);

    log::info!("translating {}", args.input);
    let parsed = translate(&args.input, &params)?;

    // The translation result travels inside a body envelope.
    let envelope = serde_json::json!({ "body": parsed });
    let json = serde_json::to_string_pretty(&envelope)?;

    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path))?
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn translate(input: &str, params: &ParseParams) -> Result<ParsedAsset> {
    let extension = Path::new(input)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if extension == "obj" {
        let text =
            fs::read_to_string(input).with_context(|| format!("failed to read {}", input))?;
        return Ok(parse_obj(params, &text));
    }

    let bytes = fs::read(input).with_context(|| format!("failed to read {}", input))?;
    let doc = xmltree::Element::parse(bytes.as_slice())
        .with_context(|| format!("failed to parse XML in {}", input))?;
    parse_document(params, &doc).with_context(|| format!("failed to translate {}", input))
}

fn build_params(args: &Args) -> ParseParams {
    let base_id = args.base_id.clone().unwrap_or_else(|| {
        Path::new(&args.input)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".to_string())
    });

    ParseParams {
        source_url: args.input.clone(),
        base_id,
        options: args.options.clone(),
    }
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        input: String::new(),
        output: None,
        base_id: None,
        options: ParseOptions::default(),
    };

    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--comments" => args.options.comments = true,
            "--bounding-boxes" => args.options.bounding_boxes = true,
            "--info" => args.options.info = true,
            "--images-dir" => {
                args.options.images_dir =
                    Some(raw.next().context("--images-dir needs a value")?)
            }
            "--base-id" => args.base_id = Some(raw.next().context("--base-id needs a value")?),
            "-o" | "--output" => {
                args.output = Some(raw.next().context("--output needs a value")?)
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown flag: {}", other),
            other => {
                if !args.input.is_empty() {
                    bail!("only one input file is supported");
                }
                args.input = other.to_string();
            }
        }
    }

    if args.input.is_empty() {
        print_usage();
        bail!("no input file given");
    }
    Ok(args)
}

fn print_usage() {
    println!("Usage: sceneport [options] <file.dae|file.obj>");
    println!();
    println!("Options:");
    println!("  --base-id <id>      Identifier namespace prefix (default: file stem)");
    println!("  --comments          Attach provenance comments to nodes");
    println!("  --bounding-boxes    Wrap geometries in bounding boxes");
    println!("  --info              Attach info tags naming source elements");
    println!("  --images-dir <dir>  Directory holding texture images");
    println!("  -o, --output <path> Write JSON to a file instead of stdout");
}
