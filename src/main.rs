use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyre::WrapErr;

use cfn_assembler::writer::{self, Format};
use cfn_assembler::{config, stacks, Template};

#[derive(Parser)]
#[command(name = "cfn-assemble")]
#[command(about = "Validate CloudFormation declarations and print the template JSON")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write the template to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Single-line JSON
    #[arg(long, global = true)]
    compact: bool,

    /// Print the resource realization order to stderr
    #[arg(long, global = true)]
    order: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a YAML or JSON template description
    File { description: PathBuf },

    /// VPC with two public and two private subnets
    Vpc,

    /// OpenShift master and node
    Openshift {
        /// Startup script of the master instance
        #[arg(long)]
        master_userdata: PathBuf,

        /// Startup script of the node instance
        #[arg(long)]
        node_userdata: PathBuf,
    },
}

fn read_userdata(path: &Path) -> eyre::Result<String> {
    fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))
}

fn template(command: &Command) -> eyre::Result<Template> {
    let template = match command {
        Command::File { description } => config::parse(description)
            .wrap_err_with(|| format!("Failed to load {}", description.display()))?,

        Command::Vpc => stacks::vpc().build(),

        Command::Openshift {
            master_userdata,
            node_userdata,
        } => stacks::openshift(&read_userdata(master_userdata)?, &read_userdata(node_userdata)?)
            .wrap_err("Failed to interpolate userdata")?
            .build(),
    };

    Ok(template)
}

fn main() -> eyre::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let document = template(&cli.command)?
        .assemble()
        .wrap_err("Template is not valid")?;

    if cli.order {
        eprintln!("{}", document.order().join("\n"));
    }

    let format = if cli.compact {
        Format::Compact
    } else {
        Format::Pretty
    };

    writer::write(&document, cli.output.as_deref(), format)
        .wrap_err("Failed to write the template")?;
    Ok(())
}
