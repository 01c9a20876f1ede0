//! Example: Translate a COLLADA file and summarize the result.
//!
//! Run with: cargo run --example convert_dae -- assets/duck.dae

use std::env;
use std::fs;
use std::path::Path;

use sceneport_core::collada::{parse_document, ParseParams};
use sceneport_core::SceneNode;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: convert_dae <path-to-dae-file>");
        println!("\nExample:");
        println!("  cargo run --example convert_dae -- assets/duck.dae");
        return;
    }

    let path = &args[1];
    println!("Translating COLLADA file: {}", path);

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Failed to read {}: {}", path, err);
            return;
        }
    };
    let doc = match xmltree::Element::parse(bytes.as_slice()) {
        Ok(doc) => doc,
        Err(err) => {
            eprintln!("Failed to parse XML: {}", err);
            return;
        }
    };

    let base_id = Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset".to_string());
    let params = ParseParams {
        source_url: path.clone(),
        base_id,
        options: Default::default(),
    };

    match parse_document(&params, &doc) {
        Ok(parsed) => {
            println!("\n=== {} ===", path);
            println!("Nodes: {}", count_nodes(&parsed.root));
            println!("Scene symbols: {}", parsed.manifest.symbols.scenes.len());
            println!("Attachments: {:?}", parsed.manifest.attachments);

            for (id, scene) in &parsed.manifest.symbols.scenes {
                println!("  scene '{}' ({} cameras)", id, scene.cameras.len());
            }
        }
        Err(err) => {
            eprintln!("Translation failed: {}", err);
        }
    }
}

fn count_nodes(node: &SceneNode) -> usize {
    1 + node.children.iter().map(count_nodes).sum::<usize>()
}
