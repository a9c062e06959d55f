use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use sheets::formats::checks::file_stem;
use sheets::{default_convertor, Config, Format, FormatOptions, KeyLayout, ParseOptions};

const USAGE: &str = "Usage: sheets [--config <file.yaml>] [--to <format>] [--key-layout <file>] <input>... [-o <dir>]
       sheets --list";

struct Args {
    config: Option<String>,
    to: Option<String>,
    key_layout: Option<String>,
    output_dir: Option<String>,
    list: bool,
    inputs: Vec<String>,
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        to: None,
        key_layout: None,
        output_dir: None,
        list: false,
        inputs: Vec::new(),
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .unwrap_or_else(|| usage_error(&format!("Missing value for {}", flag)))
        };
        match arg.as_str() {
            "--config" => args.config = Some(value("--config")),
            "--to" => args.to = Some(value("--to")),
            "--key-layout" => args.key_layout = Some(value("--key-layout")),
            "-o" | "--output" => args.output_dir = Some(value("-o")),
            "--list" => args.list = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                usage_error(&format!("Unknown option: {}", flag))
            }
            _ => args.inputs.push(arg),
        }
    }
    args
}

fn read_file(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path, e);
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = parse_args();

    if args.list {
        for format in Format::ALL {
            println!("{}", format);
        }
        return;
    }

    if args.inputs.is_empty() {
        usage_error("No input files");
    }

    // Config file first, flags override it
    let mut config = match &args.config {
        Some(path) => match read_file(path).parse::<Config>() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid config '{}': {}", path, e);
                process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(label) = &args.to {
        match label.parse::<Format>() {
            Ok(format) => config.format = Some(format),
            Err(e) => usage_error(&e.to_string()),
        }
    }
    if let Some(path) = &args.key_layout {
        match read_file(path).parse::<KeyLayout>() {
            Ok(layout) => config.key_layout = Some(layout),
            Err(e) => {
                eprintln!("Invalid key layout '{}': {}", path, e);
                process::exit(1);
            }
        }
    }

    let format = match config.format {
        Some(format) => format,
        None => usage_error("No output format; pass --to or set \"format\" in the config"),
    };

    if args.inputs.len() > 1 && args.output_dir.is_none() {
        usage_error("Converting several inputs needs an output directory (-o)");
    }

    let convertor = default_convertor();
    let format_opts = FormatOptions {
        key_layout: config.key_layout,
    };

    let mut failed = false;
    for input in &args.inputs {
        let path = Path::new(input);
        let parse_opts = ParseOptions {
            filename: path.file_name().map(|name| name.to_string_lossy().into_owned()),
        };

        let source = read_file(input);
        let output = match convertor.convert(format.label(), &source, &parse_opts, &format_opts) {
            Ok(output) => output,
            Err(e) => {
                eprintln!("Conversion error in '{}': {}", input, e);
                failed = true;
                continue;
            }
        };

        match &args.output_dir {
            Some(dir) => {
                let target = output_path(dir, path, format);
                if let Err(e) = fs::write(&target, &output) {
                    eprintln!("Error writing to '{}': {}", target.display(), e);
                    process::exit(1);
                }
                eprintln!("Wrote {} to {}", format, target.display());
            }
            None => {
                println!("{}", output);
            }
        }
    }

    if failed {
        process::exit(1);
    }
}

/// `<dir>/<input stem>.<format extension>`
fn output_path(dir: &str, input: &Path, format: Format) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sheet".to_string());
    let stem = file_stem(&name, Some(".yp."));
    Path::new(dir).join(format!("{}.{}", stem, format.extension()))
}
