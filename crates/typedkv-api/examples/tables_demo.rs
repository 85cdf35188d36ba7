//! Walks through typed namespaces, persistence and backups.
//!
//! Run with: cargo run -p typedkv --example tables_demo

use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::path::Path;
use typedkv::logging::LogConfig;
use typedkv::{Database, Error, NamespaceMultiple, NamespaceSingle, Txn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Book {
    title: String,
    author: String,
    year: u16,
}

struct Library {
    next_id: NamespaceSingle<u64>,
    books: NamespaceMultiple<u64, Book>,
}

fn library(txn: Txn) -> Library {
    Library {
        next_id: NamespaceSingle::new(txn.clone(), "next_id"),
        books: NamespaceMultiple::new(txn, "books"),
    }
}

fn add_book(db: &Database<Library>, book: Book) -> Result<u64, Error> {
    db.update(|lib| {
        let id = lib.next_id.get()?;
        lib.books.set(&id, &book)?;
        lib.next_id.set(&(id + 1))?;
        Ok(id)
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = LogConfig::default().init()?;

    let db_path = "./demo_library";
    if Path::new(db_path).exists() {
        std::fs::remove_dir_all(db_path)?;
    }

    println!("PART 1: writing books");
    {
        let db = Database::open(db_path, library)?;
        add_book(
            &db,
            Book {
                title: "The Rust Programming Language".to_string(),
                author: "Klabnik & Nichols".to_string(),
                year: 2018,
            },
        )?;
        add_book(
            &db,
            Book {
                title: "Programming Rust".to_string(),
                author: "Blandy & Orendorff".to_string(),
                year: 2017,
            },
        )?;
        db.close()?;
    }

    println!("PART 2: reopening and listing");
    let db = Database::open(db_path, library)?;
    db.view(|lib| {
        lib.books.iterate(|id, book| {
            println!("  #{} {} ({}, {})", id, book.title, book.author, book.year);
            Ok::<_, Error>(ControlFlow::Continue(()))
        })
    })?;

    let wanted = Book {
        title: "Programming Rust".to_string(),
        author: "Blandy & Orendorff".to_string(),
        year: 2017,
    };
    let id = db.view(|lib| lib.books.find_key_by_value(&wanted))?;
    println!("  found {:?} at id {:?}", wanted.title, id);

    println!("PART 3: backup into a scratch database");
    let mut backup = Vec::new();
    let entries = db.backup(&mut backup)?;
    let scratch = Database::in_memory(library)?;
    scratch.load_backup(backup.as_slice())?;
    println!(
        "  copied {} entries, next id is {}",
        entries,
        scratch.view(|lib| lib.next_id.get())?
    );

    db.close()?;
    std::fs::remove_dir_all(db_path)?;
    Ok(())
}
