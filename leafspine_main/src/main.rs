// Leafspine: ECMP Table Compiler for Spine-Leaf Fabrics
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use leafspine::allocator::{allocate, AllocatorConfig, DEFAULT_PORT_BASE};
use leafspine::compiler::{compile, compile_switch};
use leafspine::printer;
use leafspine::topology::{build_topology, FabricParams, NodeName};
use leafspine_runtime::dump::DumpSink;
use leafspine_runtime::{program_fabric_parallel, ProgramOptions};

use clap::{Args, Parser, Subcommand};
use log::*;
use std::error::Error;
use std::net::Ipv4Addr;

fn main() -> Result<(), Box<dyn Error>> {
    // initialize the env logger
    pretty_env_logger::init();

    // run clap
    let args = CommandLineArguments::parse();

    // match on the action
    match args.cmd {
        MainCommand::Topology { fabric } => {
            let topo = build_topology(fabric.params())?;
            println!("{}", printer::topology(&topo).join("\n"));
        }
        MainCommand::Ports { fabric } => {
            let topo = build_topology(fabric.params())?;
            let endpoints = allocate(&topo, &fabric.allocator())?;
            println!("{}", printer::endpoints(&endpoints).join("\n"));
        }
        MainCommand::Compile { fabric, switch, json_filename } => {
            let topo = build_topology(fabric.params())?;
            match switch {
                Some(switch) => {
                    let entries = compile_switch(&topo, switch)?;
                    println!("{}", printer::switch_program(switch, &entries).join("\n"));
                }
                None => {
                    let plan = compile(&topo)?;
                    println!("{}", printer::routing_plan(&plan).join("\n"));
                    if let Some(json_filename) = json_filename {
                        info!("Writing the plan to {}", json_filename);
                        std::fs::write(json_filename, serde_json::to_string_pretty(&plan)?)?;
                    }
                }
            }
        }
        MainCommand::Program { fabric, dump_dir, retries, num_threads, json_filename } => {
            let topo = build_topology(fabric.params())?;
            let endpoints = allocate(&topo, &fabric.allocator())?;
            let plan = compile(&topo)?;

            let sink = DumpSink::new(&dump_dir)?.with_endpoints(endpoints);
            let options = ProgramOptions { retries, threads: num_threads };
            let report = program_fabric_parallel(&plan, move || Ok(sink.clone()), options)?;

            for s in report.switches.iter() {
                println!(
                    "{:<10} {:>3} entries, {} attempt(s), {}",
                    s.switch,
                    s.entries,
                    s.attempts,
                    if s.is_success() { "ok" } else { "FAILED" }
                );
            }
            if let Some(json_filename) = json_filename {
                info!("Writing the report to {}", json_filename);
                std::fs::write(json_filename, serde_json::to_string_pretty(&report)?)?;
            }
            if !report.is_success() {
                let failed = report.failed().count();
                return Err(format!("{} switches could not be programmed", failed).into());
            }
        }
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "Leafspine", author = "Tibor Schneider")]
struct CommandLineArguments {
    /// Action to perform
    #[command(subcommand)]
    cmd: MainCommand,
}

#[derive(Subcommand, Debug)]
enum MainCommand {
    /// Print all switches, hosts and links of the fabric
    #[command(name = "topology")]
    Topology {
        #[command(flatten)]
        fabric: FabricArguments,
    },
    /// Print the control endpoint of every switch
    #[command(name = "ports")]
    Ports {
        #[command(flatten)]
        fabric: FabricArguments,
    },
    /// Compile and print the table entries
    #[command(name = "compile")]
    Compile {
        #[command(flatten)]
        fabric: FabricArguments,
        /// Only compile the entries of this switch, like `lowr0_1`
        #[arg(short = 's', long)]
        switch: Option<NodeName>,
        /// Store the routing plan in a json file
        #[arg(long = "json")]
        json_filename: Option<String>,
    },
    /// Compile the table entries and write the requests of every switch into a dump directory
    #[command(name = "program")]
    Program {
        #[command(flatten)]
        fabric: FabricArguments,
        /// Directory for the request dump files
        #[arg(short = 'd', long)]
        dump_dir: String,
        /// Number of additional attempts for every switch
        #[arg(short = 'r', long, default_value = "2")]
        retries: usize,
        /// Number of worker threads (defaults to the number of CPUs)
        #[arg(short = 't', long = "threads")]
        num_threads: Option<usize>,
        /// Store the report in a json file
        #[arg(long = "json")]
        json_filename: Option<String>,
    },
}

#[derive(Args, Debug)]
struct FabricArguments {
    /// Number of pods
    #[arg(short = 'k', long, default_value = "4")]
    k: usize,
    /// Number of rows of core switches
    #[arg(long, default_value = "2")]
    rows: usize,
    /// Number of columns of core switches
    #[arg(long, default_value = "2")]
    cols: usize,
    /// Address on which the switch processes listen
    #[arg(short = 'a', long, default_value = "127.0.0.1")]
    address: Ipv4Addr,
    /// Port base for the control endpoints. The first switch uses the next port.
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT_BASE)]
    port_base: u16,
}

impl FabricArguments {
    fn params(&self) -> FabricParams {
        FabricParams::new(self.k, self.rows, self.cols)
    }

    fn allocator(&self) -> AllocatorConfig {
        AllocatorConfig { address: self.address, port_base: self.port_base }
    }
}
