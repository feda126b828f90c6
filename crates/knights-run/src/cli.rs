use clap::Parser;
use knights_lang::{Context, Engine};
use miette::IntoDiagnostic;
use miette::miette;
use std::io::{self, BufWriter, Read, Write};
use std::{fs, path::PathBuf};

const STDIN: &str = "-";

#[derive(Parser, Debug)]
#[command(name = "knights")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "Examples:\n\n\
    To render a template with a JSON context:\n\
    $ knights -c context.json page.html\n\n\
    To bind string values from the command line:\n\
    $ echo 'Hello {{ name }}!' | knights --args name World\n\n\
    To read the context from stdin:\n\
    $ cat context.json | knights -c - page.html")]
#[command(about = "Render knights templates from the command line.", long_about = None)]
pub struct Cli {
    #[clap(flatten)]
    input: InputArgs,

    #[clap(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,

    /// Template file to render, or `-` for stdin
    #[arg(value_name = "TEMPLATE")]
    template: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::Args, Default)]
struct InputArgs {
    /// JSON object used as the render context, or `-` for stdin
    #[arg(short, long, value_name = "FILE")]
    context: Option<PathBuf>,

    /// Sets a string that can be referenced from the template
    #[arg(long, value_names = ["NAME", "VALUE"])]
    args: Option<Vec<String>>,

    /// Sets file contents that can be referenced from the template
    #[arg(long = "rawfile", value_names = ["NAME", "FILE"])]
    raw_file: Option<Vec<String>>,

    /// Maximum nesting depth of method renders
    #[arg(long)]
    max_render_depth: Option<u32>,
}

#[derive(Clone, Debug, clap::Args, Default)]
struct OutputArgs {
    /// Unbuffered output
    #[clap(long, default_value_t = false)]
    unbuffered: bool,

    /// Output to the specified file
    #[clap(short = 'o', long = "output", value_name = "FILE")]
    output_file: Option<PathBuf>,
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        let (name, source) = self.read_template()?;
        let context = self.create_context()?;
        let engine = self.create_engine();

        let template = engine.compile_named(&name, &source)?;
        log::debug!("Compiled `{}` with methods {:?}", name, template.method_names());

        self.write(&template, &context, &source)
    }

    fn create_engine(&self) -> Engine {
        let mut engine = Engine::default();

        if let Some(depth) = self.input.max_render_depth {
            engine.set_max_render_depth(depth);
        }

        engine
    }

    fn create_context(&self) -> miette::Result<Context> {
        let mut context = match &self.input.context {
            Some(path) => {
                let json = if is_stdin(path) {
                    if self.template.as_deref().is_none_or(is_stdin) {
                        return Err(miette!("Template and context cannot both be read from stdin"));
                    }
                    read_stdin()?
                } else {
                    fs::read_to_string(path).into_diagnostic()?
                };

                Context::from_json(&json).into_diagnostic()?
            }
            None => Context::new(),
        };

        if let Some(args) = &self.input.args {
            for v in args.chunks(2) {
                context.insert(v[0].as_str(), v[1].as_str());
            }
        }

        if let Some(raw_file) = &self.input.raw_file {
            for v in raw_file.chunks(2) {
                let path = PathBuf::from(&v[1]);

                if !path.exists() {
                    return Err(miette!("File not found: {}", path.display()));
                }

                let content = fs::read_to_string(&path).into_diagnostic()?;
                context.insert(v[0].as_str(), content);
            }
        }

        Ok(context)
    }

    fn read_template(&self) -> miette::Result<(String, String)> {
        match &self.template {
            Some(path) if !is_stdin(path) => {
                let source = fs::read_to_string(path)
                    .map_err(|e| miette!("Failed to read {}: {}", path.display(), e))?;
                Ok((path.to_string_lossy().to_string(), source))
            }
            _ => Ok(("<stdin>".to_string(), read_stdin()?)),
        }
    }

    fn write(&self, template: &knights_lang::Template, context: &Context, source: &str) -> miette::Result<()> {
        let stdout = io::stdout();
        let mut handle: Box<dyn Write> = if let Some(output_file) = &self.output.output_file {
            let file = fs::File::create(output_file).into_diagnostic()?;
            Box::new(BufWriter::new(file))
        } else if self.output.unbuffered {
            Box::new(stdout.lock())
        } else {
            Box::new(BufWriter::new(stdout.lock()))
        };

        for fragment in template.render(context) {
            let fragment = fragment.map_err(|e| knights_lang::Error::from_error(source, e))?;
            handle.write_all(fragment.as_bytes()).map_err(|e| miette!(e))?;
        }

        handle.flush().map_err(|e| miette!(e))
    }
}

fn is_stdin(path: &std::path::Path) -> bool {
    path.as_os_str() == STDIN
}

fn read_stdin() -> miette::Result<String> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input).into_diagnostic()?;
    Ok(input)
}
