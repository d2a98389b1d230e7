use anyhow::Result;
use clap::Parser;

use overlay_translator::CaptureRegion;

#[derive(Parser, Debug)]
#[command(
    name = "overlay-translator",
    version,
    about = "Overlay translated text onto a screen capture"
)]
struct Cli {
    /// Screen capture to translate
    #[arg(long = "image")]
    image: Option<String>,

    /// Capture region inside the image: x,y,width,height
    #[arg(long = "region")]
    region: Option<CaptureRegion>,

    /// Saved DetectDocumentText JSON response to use instead of tesseract
    #[arg(long = "ocr-json")]
    ocr_json: Option<String>,

    /// Tesseract languages (e.g. eng+jpn; default from settings [ocr])
    #[arg(long = "ocr-lang")]
    ocr_lang: Option<String>,

    /// External translator command; {source} and {target} are substituted
    #[arg(long = "translator-cmd")]
    translator_cmd: Option<String>,

    /// JSON glossary: {"<target>": {"<source text>": "<translation>"}}
    #[arg(long = "glossary")]
    glossary: Option<String>,

    /// Target language (default from settings [translate])
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Source language. Use "auto" to detect.
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// Extra target languages rendered from the same OCR result
    #[arg(long = "retranslate", value_delimiter = ',')]
    retranslate: Vec<String>,

    /// Output PNG path (default: overlay.png)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Print the detected blocks as JSON
    #[arg(long = "dump-blocks")]
    dump_blocks: bool,

    /// Show supported translation languages and exit
    #[arg(long = "show-enabled-languages")]
    show_enabled_languages: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    overlay_translator::logging::init(cli.verbose)?;

    let output = overlay_translator::run(overlay_translator::Config {
        image: cli.image,
        region: cli.region,
        ocr_json: cli.ocr_json,
        ocr_lang: cli.ocr_lang,
        translator_cmd: cli.translator_cmd,
        glossary: cli.glossary,
        lang: cli.lang,
        source_lang: cli.source_lang,
        retranslate: cli.retranslate,
        output: cli.output,
        dump_blocks: cli.dump_blocks,
        settings_path: cli.read_settings,
        show_enabled_languages: cli.show_enabled_languages,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
