//! Command dispatch.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context as _;
use kiln_builder::{Builder, BuilderOptions, SourceManager};
use kiln_common::LineDetails;

use crate::args::{Cli, Command};
use crate::config::ProjectConfig;
use crate::log;
use crate::packages::PackageManager;

/// Adapt the parser into the source manager's front-end contract,
/// folding syntax errors into rendered messages.
fn frontend(
    path: &Path,
    text: &str,
) -> kiln_builder::BuildResult<kiln_builder::ParsedFile> {
    match kiln_parser::parse(text) {
        Ok(output) => Ok(kiln_builder::ParsedFile {
            arena: output.arena,
            root: output.root,
        }),
        Err(error) => {
            let details = LineDetails::from_offset(text, error.offset);
            Err(kiln_builder::BuildError::new(format!(
                "{} [line {}] in {}\n{}\n{}",
                error.message,
                details.line_number,
                path.display(),
                details.line,
                details.marker
            )))
        }
    }
}

/// Render a verify error as one line of issue, the offending source line,
/// and a caret under the column.
fn render_error(sources: &SourceManager, error: &kiln_builder::BuildError) -> String {
    match error.node {
        Some((file, node)) => {
            let file = sources.file(file);
            let span = file.arena.span(node);

            if file.text.is_empty() || span.is_dummy() {
                return error.message.clone();
            }

            let details = LineDetails::from_offset(&file.text, span.start);
            format!(
                "{} [line {}]\n{}\n{}",
                error.message, details.line_number, details.line, details.marker
            )
        }
        None => error.message.clone(),
    }
}

struct CompileOutcome {
    module_text: String,
}

fn compile_file(path: &Path, triple: &str, print_ir: bool) -> anyhow::Result<CompileOutcome> {
    let mut sources = SourceManager::new();

    let file = sources
        .load(path, &frontend)
        .map_err(|error| anyhow::anyhow!("{}", error.message))?;

    sources
        .resolve(file, &frontend)
        .map_err(|error| anyhow::anyhow!("{}", error.message))?;

    let options = BuilderOptions {
        triple: triple.to_string(),
        print_ir,
    };

    let mut builder = Builder::new(&sources, file, options)
        .map_err(|error| anyhow::anyhow!("{}", render_error(&sources, &error)))?;

    builder
        .build()
        .map_err(|error| anyhow::anyhow!("{}", render_error(&sources, &error)))?;

    let module_text = kiln_ir::display::render_module(&builder.module);

    if print_ir {
        println!("{module_text}");
    }

    for insight in &builder.insights {
        log::step("insight", insight);
    }

    Ok(CompileOutcome { module_text })
}

fn command_build(project_path: &Path, print_ir: bool) -> anyhow::Result<()> {
    let config = ProjectConfig::load(project_path)?;
    let root = project_path.parent().unwrap_or(Path::new("."));
    let output_dir = root.join(&config.output_directory);

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Cannot create output directory {}.", output_dir.display()))?;

    let triple = &config.options.options.triple;
    let print_ir = print_ir || config.options.options.print_ir;

    tracing::info!(name = %config.name, files = config.files.len(), "building project");

    for file in &config.files {
        let path = root.join(file);
        log::step("build", &format!("compiling {}", path.display()));

        let outcome = compile_file(&path, triple, print_ir)?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".into());
        let artifact = output_dir.join(format!("{stem}.ir"));

        std::fs::write(&artifact, outcome.module_text)
            .with_context(|| format!("Cannot write artifact {}.", artifact.display()))?;

        log::step("build", &format!("wrote {}", artifact.display()));
    }

    Ok(())
}

fn command_run(project_path: &Path) -> anyhow::Result<()> {
    command_build(project_path, false)?;

    // Producing runnable objects needs a native backend; the build stops
    // at IR artifacts.
    anyhow::bail!(
        "run requires a native code generator; IR artifacts are in the output directory."
    );
}

fn command_clean(project_path: &Path) -> anyhow::Result<()> {
    let config = ProjectConfig::load(project_path)?;
    let root = project_path.parent().unwrap_or(Path::new("."));

    for dir in [&config.output_directory, &config.packages_directory] {
        let path = root.join(dir);
        if path.exists() {
            std::fs::remove_dir_all(&path)
                .with_context(|| format!("Cannot remove {}.", path.display()))?;
            log::step("clean", &format!("removed {}", path.display()));
        }
    }

    Ok(())
}

fn command_install(project_path: &Path, url: &str, arguments: &[String]) -> anyhow::Result<()> {
    let config = ProjectConfig::load(project_path)?;
    let root = project_path
        .parent()
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let packages = root.join(&config.packages_directory);

    let mut manager = PackageManager::new(root, packages)?;
    let fragments = manager.install(url, arguments)?;

    for fragment in fragments {
        log::step("packages", &format!("fragment {fragment}"));
    }

    Ok(())
}

fn command_remove(project_path: &Path, url: &str) -> anyhow::Result<()> {
    let config = ProjectConfig::load(project_path)?;
    let root = project_path
        .parent()
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let packages = root.join(&config.packages_directory);

    let mut manager = PackageManager::new(root, packages)?;

    if manager.remove(url)? {
        log::step("packages", &format!("removed {url}"));
    } else {
        log::warning("packages", &format!("{url} was not installed"));
    }

    Ok(())
}

fn command_compile(
    file: &Path,
    output: Option<&Path>,
    triple: &str,
    print_ir: bool,
) -> anyhow::Result<()> {
    let outcome = compile_file(file, triple, print_ir)?;

    if let Some(output) = output {
        std::fs::write(output, outcome.module_text)
            .with_context(|| format!("Cannot write artifact {}.", output.display()))?;
        log::step("compile", &format!("wrote {}", output.display()));
    }

    Ok(())
}

/// Print the public surface of one source file: types, globals, and
/// function signatures with rendered type strings.
fn command_expose(file: &Path) -> anyhow::Result<()> {
    let mut sources = SourceManager::new();

    let id = sources
        .load(file, &frontend)
        .map_err(|error| anyhow::anyhow!("{}", error.message))?;
    sources
        .resolve(id, &frontend)
        .map_err(|error| anyhow::anyhow!("{}", error.message))?;

    let builder = Builder::new(&sources, id, BuilderOptions::default())
        .map_err(|error| anyhow::anyhow!("{}", render_error(&sources, &error)))?;

    let root = sources.root(id);
    let children = match &sources.node(root).data {
        kiln_ast::NodeData::Root(data) => data.children.clone(),
        _ => Vec::new(),
    };

    for child in children {
        let nref = kiln_builder::NodeRef {
            file: id,
            node: child,
        };

        match &sources.node(nref).data {
            kiln_ast::NodeData::TypeDecl(decl) => {
                println!("type {}", decl.name);
                for &field in &decl.fields {
                    let field = kiln_builder::NodeRef {
                        file: id,
                        node: field,
                    };
                    if let kiln_ast::NodeData::Variable(variable) = &sources.node(field).data {
                        let ty = variable
                            .type_spec
                            .as_ref()
                            .and_then(|spec| builder.resolve_typespec(field, spec).ok());
                        match ty {
                            Some(ty) => println!("  {} {ty}", variable.name),
                            None => println!("  {}", variable.name),
                        }
                    }
                }
            }
            kiln_ast::NodeData::Function(function) => {
                match builder.function_signature(nref) {
                    Ok(signature) => {
                        let parameters: Vec<String> = signature
                            .parameters
                            .iter()
                            .map(|(name, ty)| format!("{name} {ty}"))
                            .collect();
                        println!(
                            "{}({}) {}",
                            function.name,
                            parameters.join(", "),
                            signature.return_type
                        );
                    }
                    Err(error) => {
                        log::warning("expose", &render_error(&sources, &error));
                    }
                }
            }
            kiln_ast::NodeData::Variable(variable) => {
                let ty = variable
                    .type_spec
                    .as_ref()
                    .and_then(|spec| builder.resolve_typespec(nref, spec).ok());
                let keyword = if variable.mutable { "var" } else { "let" };
                match ty {
                    Some(ty) => println!("{keyword} {} {ty}", variable.name),
                    None => println!("{keyword} {}", variable.name),
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Run the parsed command line; the process exit code is zero only when
/// every step succeeded.
pub fn run(cli: Cli) -> ExitCode {
    let outcome = match &cli.command {
        Command::Install { url, arguments } => command_install(&cli.project, url, arguments),
        Command::Remove { url } => command_remove(&cli.project, url),
        Command::Clean => command_clean(&cli.project),
        Command::Run => command_run(&cli.project),
        Command::Build { print_ir } => command_build(&cli.project, *print_ir),
        Command::Compile {
            file,
            output,
            triple,
            print_ir,
        } => command_compile(file, output.as_deref(), triple, *print_ir),
        Command::Expose { file } => command_expose(file),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::failure("kiln", &format!("{error:#}"));
            ExitCode::FAILURE
        }
    }
}
