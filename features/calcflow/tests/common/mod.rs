#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use calcflow::{
    errors::BindingFailure, Component, DynError, FactoryRegistry, ProducerOutput, TypeInfo, Value,
    RESULT,
};

/// Test producer, outputs `ID + bias + sum of its inputs` under [`RESULT`]
#[derive(Debug, Default)]
pub struct Node<const ID: u8> {
    pub bias: u32,
    pub inputs: BTreeMap<String, u32>,
}

impl<const ID: u8> Node<ID> {
    pub fn with_bias(bias: u32) -> Self {
        Self {
            bias,
            inputs: BTreeMap::new(),
        }
    }

    pub fn total(&self) -> u32 {
        ID as u32 + self.bias + self.inputs.values().sum::<u32>()
    }
}

impl<const ID: u8> Component for Node<ID> {
    fn result(&self) -> ProducerOutput {
        ProducerOutput::from([(RESULT.to_string(), Arc::new(self.total()) as Value)])
    }

    fn inject(&mut self, field: &str, value: Value) -> Result<(), DynError> {
        let value = value.downcast::<u32>().map_err(|_| BindingFailure::Downcast {
            required_type: "u32",
        })?;
        self.inputs.insert(field.to_string(), *value);
        Ok(())
    }
}

pub type Log = Arc<Mutex<Vec<TypeInfo>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn count(log: &Log, node: TypeInfo) -> usize {
    log.lock().unwrap().iter().filter(|entry| **entry == node).count()
}

/// Registers `Node<ID>`, recording every construction in `log`
pub fn record<const ID: u8>(factory: FactoryRegistry, log: &Log) -> FactoryRegistry {
    let log = log.clone();
    factory.register_with(move || {
        log.lock().unwrap().push(TypeInfo::of::<Node<ID>>());
        Ok::<_, DynError>(Node::<ID>::default())
    })
}

/// Recording factory for `Node<0>` up to `Node<7>`
pub fn recording_factory(log: &Log) -> FactoryRegistry {
    let factory = FactoryRegistry::new();
    let factory = record::<0>(factory, log);
    let factory = record::<1>(factory, log);
    let factory = record::<2>(factory, log);
    let factory = record::<3>(factory, log);
    let factory = record::<4>(factory, log);
    let factory = record::<5>(factory, log);
    let factory = record::<6>(factory, log);
    record::<7>(factory, log)
}

pub fn node_info(id: u8) -> TypeInfo {
    match id {
        0 => TypeInfo::of::<Node<0>>(),
        1 => TypeInfo::of::<Node<1>>(),
        2 => TypeInfo::of::<Node<2>>(),
        3 => TypeInfo::of::<Node<3>>(),
        4 => TypeInfo::of::<Node<4>>(),
        5 => TypeInfo::of::<Node<5>>(),
        6 => TypeInfo::of::<Node<6>>(),
        _ => TypeInfo::of::<Node<7>>(),
    }
}
