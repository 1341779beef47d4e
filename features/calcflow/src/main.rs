use std::{collections::HashMap, sync::Arc};

use calcflow::{
    errors::BindingFailure, CalcFlow, Component, DynError, ExecutionStrategy, FactoryRegistry,
    InstanceRegistry, MetadataCatalog, ProducerOutput, ProducerResult, Value, RESULT,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("calcflow=debug")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("Calculation failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = MetadataCatalog::new()
        .capability::<dyn PriceSource>()
        .extends::<ListPrices, dyn PriceSource>()
        .prepare::<Invoice, ListPrices>()
        .field::<Invoice, dyn PriceSource>("prices")
        .field_keyed::<Invoice, Totals>("net", "net")
        .field_keyed::<Invoice, Totals>("gross", "gross")
        .field::<Totals, dyn PriceSource>("prices")
        .field::<Totals, TaxRate>("rate");

    // Settings a container would normally supply
    let settings = Arc::new(HashMap::from([("tax_percent", 19_u32)]));
    let factory = FactoryRegistry::new()
        .register::<ListPrices>()
        .register::<Totals>()
        .register::<Invoice>()
        .register_with(move || {
            settings
                .get("tax_percent")
                .map(|percent| TaxRate(*percent))
                .ok_or("tax_percent is not configured")
        });

    let flow = CalcFlow::builder()
        .scanner(catalog)
        .factory(factory)
        .strategy(ExecutionStrategy::Concurrent { workers: 2 })
        .build()?;

    let invoice = flow.produce::<Invoice>()?;
    println!("{}", flow.graph_builder().discover(calcflow::TypeInfo::of::<Invoice>())?);
    println!(
        "items: {:?} net: {} gross: {}",
        invoice.prices.get(),
        invoice.net.get(),
        invoice.gross.get()
    );

    // A second build reuses the cached graph, with a different tax rate pre-seeded
    let pre_seeded = InstanceRegistry::new().with(TaxRate(7));
    let reduced = flow.produce_with::<Invoice>(&pre_seeded)?;
    println!("reduced gross: {}", reduced.gross.get());

    // Both builds priced the same items
    let prices = invoice.prices.shared();
    println!(
        "same items: {}",
        prices.is_some() && prices == reduced.prices.shared()
    );

    Ok(())
}

trait PriceSource: Send + Sync {}

#[derive(Default)]
struct ListPrices;
impl PriceSource for ListPrices {}
impl Component for ListPrices {
    fn result(&self) -> ProducerOutput {
        ProducerOutput::from([(RESULT.to_string(), Arc::new(vec![1200_u64, 350, 99]) as Value)])
    }
}

struct TaxRate(u32);
impl Component for TaxRate {
    fn result(&self) -> ProducerOutput {
        ProducerOutput::from([(RESULT.to_string(), Arc::new(self.0) as Value)])
    }
}

#[derive(Default)]
struct Totals {
    prices: ProducerResult<Vec<u64>>,
    rate: ProducerResult<u32>,
}
impl Component for Totals {
    fn result(&self) -> ProducerOutput {
        let net: u64 = self.prices.try_get().into_iter().flatten().sum();
        let rate = self.rate.try_get().copied().unwrap_or_default() as u64;
        ProducerOutput::from([
            ("net".to_string(), Arc::new(net) as Value),
            ("gross".to_string(), Arc::new(net + net * rate / 100) as Value),
        ])
    }

    fn inject(&mut self, field: &str, value: Value) -> Result<(), DynError> {
        match field {
            "prices" => self.prices.fill(value),
            "rate" => self.rate.fill(value),
            _ => Err(Box::new(BindingFailure::UnknownField {
                field: field.to_string(),
            })),
        }
    }
}

#[derive(Default)]
struct Invoice {
    prices: ProducerResult<Vec<u64>>,
    net: ProducerResult<u64>,
    gross: ProducerResult<u64>,
}
impl Component for Invoice {
    fn inject(&mut self, field: &str, value: Value) -> Result<(), DynError> {
        match field {
            "prices" => self.prices.fill(value),
            "net" => self.net.fill(value),
            "gross" => self.gross.fill(value),
            _ => Err(Box::new(BindingFailure::UnknownField {
                field: field.to_string(),
            })),
        }
    }
}
