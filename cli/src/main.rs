use clap::{Parser, Subcommand, ValueEnum};
use simdgroup_headers::{
    Action, AddressSpace, Header, MemoryAccessDescriptor, morton::lane_table,
};
use std::io::{self, Write};

/// Prints the Metal headers used by the GEMM kernels.
#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// The synchronous `simdgroup_event` copy header.
    Event,
    /// The `simdgroup_matrix_storage` header.
    MatrixStorage,
    /// Both headers, one after the other.
    All,
    /// A single load or store member function.
    Access {
        #[arg(long, value_enum)]
        action: Option<ActionArg>,
        #[arg(long, value_enum)]
        address_space: Option<AddressSpaceArg>,
        #[arg(long)]
        bfloat: Option<bool>,
        #[arg(long)]
        indentation: Option<usize>,
    },
    /// Which lane owns each element of an 8x8 fragment.
    Layout,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ActionArg {
    Load,
    Store,
}

impl From<ActionArg> for Action {
    fn from(value: ActionArg) -> Self {
        match value {
            ActionArg::Load => Action::Load,
            ActionArg::Store => Action::Store,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AddressSpaceArg {
    Device,
    Threadgroup,
}

impl From<AddressSpaceArg> for AddressSpace {
    fn from(value: AddressSpaceArg) -> Self {
        match value {
            AddressSpaceArg::Device => AddressSpace::Device,
            AddressSpaceArg::Threadgroup => AddressSpace::Threadgroup,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();

    let output = match cli.command {
        Command::Event => Header::SimdgroupEvent.generate(),
        Command::MatrixStorage => Header::SimdgroupMatrixStorage.generate(),
        Command::All => Header::ALL
            .iter()
            .map(|header| header.generate())
            .collect::<Vec<_>>()
            .join("\n"),
        Command::Access {
            action,
            address_space,
            bfloat,
            indentation,
        } => {
            let mut builder = MemoryAccessDescriptor::builder();
            if let Some(action) = action {
                builder = builder.action(action.into());
            }
            if let Some(address_space) = address_space {
                builder = builder.address_space(address_space.into());
            }
            if let Some(bfloat) = bfloat {
                builder = builder.decoding_bf16(bfloat);
            }
            if let Some(indentation) = indentation {
                builder = builder.indentation(indentation);
            }
            builder.generate()?
        }
        Command::Layout => lane_table()
            .iter()
            .map(|row| {
                let lanes: Vec<_> = row.iter().map(|lane| format!("{lane:>2}")).collect();
                lanes.join(" ") + "\n"
            })
            .collect(),
    };

    tracing::debug!(bytes = output.len(), "writing output");
    io::stdout().lock().write_all(output.as_bytes())?;
    Ok(())
}
