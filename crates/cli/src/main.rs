use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use techcard_core::{
    config::core_config_from_env_values, default_recognizer, parse, renderer::write_blank_template,
    CoreConfig, RecipeError, RecipeService, RecipeStore,
};

#[derive(Parser)]
#[command(name = "techcard")]
#[command(about = "Recipe OCR and technical-card CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a recipe text file and print the fields as JSON
    Parse {
        /// Text file, one line per recognised fragment
        file: PathBuf,
    },
    /// Recognise a recipe image and print the text and fields as JSON
    Ocr {
        /// Image file (PNG, JPEG, ...)
        image: PathBuf,
    },
    /// Generate a technical card
    Generate {
        /// Recipe id; without --text-file the stored recipe text is used
        #[arg(long)]
        id: Option<String>,
        /// Text file to parse instead of a stored recipe
        #[arg(long)]
        text_file: Option<PathBuf>,
    },
    /// List stored recipes
    List,
    /// Write a blank technical-card template at the configured template path
    InitTemplate {
        /// Overwrite an existing template
        #[arg(long)]
        force: bool,
    },
}

/// Reads the `TECHCARD_*` variables the same way the servers do.
fn config_from_env() -> Result<CoreConfig, RecipeError> {
    config_from_vars(|key| std::env::var(key).ok())
}

fn config_from_vars(get: impl Fn(&str) -> Option<String>) -> Result<CoreConfig, RecipeError> {
    core_config_from_env_values(
        get("TECHCARD_STORAGE_DIR"),
        get("TECHCARD_TEMPLATE_PATH"),
        get("TECHCARD_OCR_LANGUAGES"),
        get("TECHCARD_TESSDATA_DIR"),
        get("TECHCARD_MAX_UPLOAD_BYTES"),
    )
}

fn read_text(path: &Path) -> Result<String, RecipeError> {
    std::fs::read_to_string(path).map_err(RecipeError::FileRead)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let cfg = config_from_env()?;

    match cli.command {
        Some(Commands::Parse { file }) => {
            let recipe = parse(&read_text(&file)?);
            println!("{}", serde_json::to_string_pretty(&recipe)?);
        }
        Some(Commands::Ocr { image }) => {
            let bytes = std::fs::read(&image).map_err(RecipeError::FileRead)?;
            let recognizer = default_recognizer(cfg.ocr_languages(), cfg.tessdata_dir());
            match recognizer.recognize(&bytes) {
                Ok(text) => {
                    let recipe = parse(&text);
                    let output = serde_json::json!({
                        "text": text,
                        "title": recipe.title,
                        "ingredients": recipe.ingredients,
                        "steps": recipe.steps,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                Err(e) => eprintln!("Error recognising {}: {}", image.display(), e),
            }
        }
        Some(Commands::Generate { id, text_file }) => {
            let text = text_file.as_deref().map(read_text).transpose()?;
            let recognizer = default_recognizer(cfg.ocr_languages(), cfg.tessdata_dir());
            let service = RecipeService::new(Arc::new(cfg), recognizer)?;
            match service.generate_card(id.as_deref(), text.as_deref()) {
                Ok(card) => println!(
                    "Generated technical card {} ({}): {}",
                    card.id,
                    if card.title.is_empty() { "untitled" } else { &card.title },
                    card.tech_card_path.display()
                ),
                Err(e) => eprintln!("Error generating technical card: {}", e),
            }
        }
        Some(Commands::List) => match RecipeStore::at(cfg.recipes_path()).list() {
            Ok(recipes) if !recipes.is_empty() => {
                for recipe in recipes {
                    println!(
                        "ID: {}, Title: {}, Created: {}, Image: {}",
                        recipe.id, recipe.title, recipe.timestamp, recipe.image_path
                    );
                }
            }
            Ok(_) | Err(RecipeError::MissingStore(_)) => println!("No recipes found."),
            Err(e) => eprintln!("Error listing recipes: {}", e),
        },
        Some(Commands::InitTemplate { force }) => {
            match write_blank_template(cfg.template_path(), force) {
                Ok(()) => println!("Wrote template: {}", cfg.template_path().display()),
                Err(e) => eprintln!("Error writing template: {}", e),
            }
        }
        None => {
            println!("Use 'techcard --help' for commands");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_env_file_values_configure_storage() {
        let temp = TempDir::new().unwrap();
        let env_file = temp.path().join(".env");
        std::fs::write(
            &env_file,
            "TECHCARD_STORAGE_DIR=shared_storage\nTECHCARD_MAX_UPLOAD_BYTES=1024\n",
        )
        .unwrap();

        let vars: HashMap<String, String> = dotenvy::from_path_iter(&env_file)
            .unwrap()
            .map(|item| item.unwrap())
            .collect();
        let cfg = config_from_vars(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(cfg.storage_dir(), Path::new("shared_storage"));
        assert_eq!(cfg.max_upload_bytes(), 1024);
        assert_eq!(cfg.ocr_languages(), "est+eng");
    }

    #[test]
    fn test_missing_vars_use_defaults() {
        let cfg = config_from_vars(|_| None).unwrap();

        assert_eq!(cfg.storage_dir(), Path::new("storage"));
    }
}
