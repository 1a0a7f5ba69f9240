use std::io::Write;

use fabric_rdma::{DescPools, IfaceAttr, OpCaps, PoolRole, TlResource};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Column-aligned text.
    Table,
    Json,
}

#[derive(Debug, Serialize)]
pub struct PoolRow {
    pub name: &'static str,
    pub elem_size: usize,
    pub align_offset: usize,
    pub grow: usize,
    pub max: Option<usize>,
    pub elems: usize,
}

pub fn pool_rows(pools: &DescPools) -> Vec<PoolRow> {
    PoolRole::ALL
        .iter()
        .map(|&role| {
            let pool = pools.pool(role);
            let params = pool.params();
            PoolRow {
                name: role.name(),
                elem_size: params.elem_size,
                align_offset: params.align_offset,
                grow: params.elems_per_chunk,
                max: params.max_elems,
                elems: pool.num_elems(),
            }
        })
        .collect()
}

pub struct Printer<W: Write = Box<dyn Write>> {
    out: W,
    format: OutputFormat,
}

impl Printer<Box<dyn Write>> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(Box::new(std::io::stdout()), format)
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn json<T: Serialize>(&mut self, key: &str, value: &T) -> std::io::Result<()> {
        let mut obj = serde_json::Map::new();
        obj.insert(key.to_string(), serde_json::to_value(value)?);
        let text = serde_json::to_string_pretty(&obj)?;
        writeln!(self.out, "{}", text)
    }

    pub fn print_resources(&mut self, resources: &[TlResource]) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Json => self.json("resources", &resources),
            OutputFormat::Table => {
                writeln!(self.out, "{:<10} {:<16} {}", "TRANSPORT", "DEVICE", "TYPE")?;
                for r in resources {
                    writeln!(self.out, "{:<10} {:<16} {}", r.tl_name, r.dev_name, r.dev_type)?;
                }
                Ok(())
            }
        }
    }

    pub fn print_attr(&mut self, attr: &IfaceAttr) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Json => self.json("capabilities", attr),
            OutputFormat::Table => {
                writeln!(self.out, "{:<6} {:>12} {:>12} {:>12}", "OP", "SHORT", "BCOPY", "ZCOPY")?;
                for (name, caps) in [("put", &attr.put), ("get", &attr.get), ("am", &attr.am)] {
                    self.caps_row(name, caps)?;
                }
                writeln!(self.out, "iface_addr_len: {}", attr.iface_addr_len)?;
                writeln!(self.out, "ep_addr_len:    {}", attr.ep_addr_len)?;
                writeln!(self.out, "flags:          {}", attr.flags.names().join(" | "))
            }
        }
    }

    fn caps_row(&mut self, name: &str, caps: &OpCaps) -> std::io::Result<()> {
        writeln!(
            self.out,
            "{:<6} {:>12} {:>12} {:>12}",
            name, caps.max_short, caps.max_bcopy, caps.max_zcopy
        )
    }

    pub fn print_pools(&mut self, rows: &[PoolRow]) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Json => self.json("pools", &rows),
            OutputFormat::Table => {
                writeln!(
                    self.out,
                    "{:<22} {:>9} {:>8} {:>6} {:>10} {:>7}",
                    "POOL", "ELEM", "OFFSET", "GROW", "MAX", "ELEMS"
                )?;
                for row in rows {
                    let max = row
                        .max
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "unlimited".into());
                    writeln!(
                        self.out,
                        "{:<22} {:>9} {:>8} {:>6} {:>10} {:>7}",
                        row.name, row.elem_size, row.align_offset, row.grow, max, row.elems
                    )?;
                }
                Ok(())
            }
        }
    }
}
