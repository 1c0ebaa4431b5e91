//! Schema command - print the ledger file schema and the CSV import format

use clap::Args;
use invest_ledger::core::LedgerStream;
use invest_ledger::ingest::CsvTransactionRow;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: json-schema, csv-header or csv-fields
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema of an event stream
    JsonSchema,
    /// CSV header row with canonical column names
    CsvHeader,
    /// CSV column descriptions and accepted aliases
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => self.print_json_schema(),
            SchemaFormat::CsvHeader => self.print_csv_header(),
            SchemaFormat::CsvFields => self.print_csv_fields(),
        }
    }

    fn print_json_schema(&self) -> anyhow::Result<()> {
        let schema = schema_for!(LedgerStream);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }

    fn print_csv_header(&self) -> anyhow::Result<()> {
        let names: Vec<&str> = CsvTransactionRow::csv_fields()
            .iter()
            .map(|f| f.name)
            .collect();
        println!("{}", names.join(","));
        Ok(())
    }

    fn print_csv_fields(&self) -> anyhow::Result<()> {
        println!("CSV Import Format");
        println!("=================");
        println!();
        for field in CsvTransactionRow::csv_fields() {
            let req = if field.required { "required" } else { "optional" };
            println!("{:12} ({:8})  {}", field.name, req, field.description);
            if !field.aliases.is_empty() {
                println!("{:24}also: {}", "", field.aliases.join(", "));
            }
        }
        println!();
        println!("Headers match case-insensitively, ignoring spaces and punctuation.");
        println!("Rows without external_id get a key derived from their content.");
        Ok(())
    }
}
