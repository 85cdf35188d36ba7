#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use typedkv::{Database, Error, NamespaceMultiple, NamespaceSingle, Txn};

#[derive(Arbitrary, Debug)]
enum Op {
    Set { key: Vec<u8>, value: u32 },
    Delete { key: Vec<u8> },
    SetSingle { value: u32 },
    DeleteSingle,
    Commit,
}

struct Bundle {
    map: NamespaceMultiple<Vec<u8>, u32>,
    neighbour: NamespaceMultiple<Vec<u8>, u32>,
    single: NamespaceSingle<u32>,
}

fn bundle(txn: Txn) -> Bundle {
    Bundle {
        map: NamespaceMultiple::new(txn.clone(), "m"),
        neighbour: NamespaceMultiple::new(txn.clone(), "mm"),
        single: NamespaceSingle::new(txn, "m"),
    }
}

fn contents(ns: &NamespaceMultiple<Vec<u8>, u32>) -> Result<BTreeMap<Vec<u8>, u32>, Error> {
    let mut seen = BTreeMap::new();
    ns.iterate(|k, v| {
        seen.insert(k, v);
        Ok::<_, Error>(ControlFlow::Continue(()))
    })?;
    Ok(seen)
}

fuzz_target!(|ops: Vec<Op>| {
    let Ok(db) = Database::in_memory(bundle) else {
        return;
    };

    let mut model: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
    let mut single: Option<u32> = None;

    // Operations between two commits run in one update
    for chunk in ops.split(|op| matches!(op, Op::Commit)).take(32) {
        db.update(|b| {
            b.neighbour.set(&vec![0xff], &0)?;
            for op in chunk.iter().take(64) {
                match op {
                    Op::Set { key, value } => {
                        b.map.set(key, value)?;
                        model.insert(key.clone(), *value);
                    }
                    Op::Delete { key } => {
                        b.map.delete(key)?;
                        model.remove(key);
                    }
                    Op::SetSingle { value } => {
                        b.single.set(value)?;
                        single = Some(*value);
                    }
                    Op::DeleteSingle => {
                        b.single.delete()?;
                        single = None;
                    }
                    Op::Commit => {}
                }
            }
            Ok::<_, Error>(())
        })
        .expect("update");
    }

    let (stored, stored_single) = db
        .view(|b| Ok::<_, Error>((contents(&b.map)?, b.single.get_opt()?)))
        .expect("view");
    assert_eq!(stored, model);
    assert_eq!(stored_single, single);
});
