//! Interactive menu over one store.
//!
//! `main` owns the store; the session borrows it for the length of the loop.

use crate::support::{describe_store_error, open_store_or_exit};
use rollbook_store::{LoadHandle, LoadOutcome, Record, RecordId, Store, StoreConfig, StoreError};
use std::io::{self, BufRead, Write};
use std::str::FromStr;

pub fn run(config: StoreConfig) {
    let mut store = open_store_or_exit(config);
    println!("Starting rollbook ({})...", store.path().display());
    let pending = initial_load(&store);

    {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut session = Session::new(&store, stdin.lock(), stdout.lock());
        if let Err(e) = session.run() {
            log::error!("terminal I/O failed: {e}");
        }
    }

    finish(&mut store, pending);
}

/// Load once at startup; failures leave the store empty and the loop running.
fn initial_load(store: &Store) -> Option<LoadHandle> {
    match store.load() {
        Ok(LoadOutcome::Completed(report)) => {
            if report.created {
                println!("No existing data; created {}", store.path().display());
            } else {
                println!("Loaded {} records.", store.len());
            }
            None
        }
        Ok(LoadOutcome::Pending(handle)) => {
            println!("Loading is taking longer than expected; continuing...");
            Some(handle)
        }
        Err(e) => {
            log::error!("initial load of {} failed: {e}", store.path().display());
            None
        }
    }
}

/// Save on the way out. A failed save is logged; the process still exits.
fn finish(store: &mut Store, pending: Option<LoadHandle>) {
    // Saving mid-load would drop the records the worker has not reached yet.
    if let Some(handle) = pending
        && let Err(e) = handle.wait()
    {
        log::error!("background load failed: {e}");
    }

    println!("Saving data before exit...");
    match store.save() {
        Ok(report) => println!("Saved {} records to {}", report.records, report.path.display()),
        Err(e) => log::error!("failed to save data: {e}"),
    }
    store.shutdown();
    println!("Goodbye.");
}

pub struct Session<'a, R, W> {
    store: &'a Store,
    input: R,
    out: W,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(store: &'a Store, input: R, out: W) -> Self {
        Self { store, input, out }
    }

    /// Run until `0` or end of input.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.show_menu()?;
            let Some(choice) = self.read_line()? else {
                writeln!(self.out)?;
                return Ok(());
            };
            match choice.trim() {
                "1" => self.handle_add()?,
                "2" => self.handle_update()?,
                "3" => self.handle_delete()?,
                "4" => self.handle_search()?,
                "5" => self.handle_view_all()?,
                "6" => self.handle_view_by_score()?,
                "0" => return Ok(()),
                _ => writeln!(self.out, "Invalid option. Try again.")?,
            }
        }
    }

    fn show_menu(&mut self) -> io::Result<()> {
        writeln!(self.out, "\n=== MENU ===")?;
        writeln!(self.out, "1. Add Record")?;
        writeln!(self.out, "2. Update Record")?;
        writeln!(self.out, "3. Delete Record")?;
        writeln!(self.out, "4. Search Record by ID")?;
        writeln!(self.out, "5. View All Records")?;
        writeln!(self.out, "6. View Records Sorted by Score")?;
        writeln!(self.out, "0. Exit and Save")?;
        write!(self.out, "Choose: ")?;
        self.out.flush()
    }

    fn handle_add(&mut self) -> io::Result<()> {
        let Some(id) = self.prompt_number::<RecordId>("Enter ID: ")? else {
            return Ok(());
        };
        let Some(name) = self.prompt("Enter name: ")? else {
            return Ok(());
        };
        let Some(score) = self.prompt_number::<f64>("Enter score (0-100): ")? else {
            return Ok(());
        };

        let record = Record::new(id, name.trim(), score);
        match self.store.add(record.clone()) {
            Ok(()) => writeln!(self.out, "Record added: {record}"),
            Err(e) => self.report(&e),
        }
    }

    fn handle_update(&mut self) -> io::Result<()> {
        let Some(id) = self.prompt_number::<RecordId>("Enter ID to update: ")? else {
            return Ok(());
        };
        let mut record = match self.store.find_by_id(id) {
            Ok(record) => record,
            Err(e) => return self.report(&e),
        };
        writeln!(self.out, "Existing: {record}")?;

        let Some(name) = self.prompt("New name (leave blank to keep): ")? else {
            return Ok(());
        };
        if !name.trim().is_empty() {
            record.name = name.trim().to_string();
        }

        let Some(score) = self.prompt("New score (leave blank to keep): ")? else {
            return Ok(());
        };
        let score = score.trim();
        if !score.is_empty() {
            match score.parse::<f64>() {
                Ok(score) => record.score = score,
                Err(_) => return writeln!(self.out, "Invalid numeric input."),
            }
        }

        match self.store.update(record.clone()) {
            Ok(()) => writeln!(self.out, "Record updated: {record}"),
            Err(e) => self.report(&e),
        }
    }

    fn handle_delete(&mut self) -> io::Result<()> {
        let Some(id) = self.prompt_number::<RecordId>("Enter ID to delete: ")? else {
            return Ok(());
        };
        match self.store.delete(id) {
            Ok(()) => writeln!(self.out, "Record deleted: ID={id}"),
            Err(e) => self.report(&e),
        }
    }

    fn handle_search(&mut self) -> io::Result<()> {
        let Some(id) = self.prompt_number::<RecordId>("Enter ID to search: ")? else {
            return Ok(());
        };
        match self.store.find_by_id(id) {
            Ok(record) => writeln!(self.out, "Found: {record}"),
            Err(e) => self.report(&e),
        }
    }

    fn handle_view_all(&mut self) -> io::Result<()> {
        let records = self.store.list_all();
        if records.is_empty() {
            return writeln!(self.out, "No records available.");
        }
        writeln!(self.out, "\n--- All Records ---")?;
        for record in records {
            writeln!(self.out, "{record}")?;
        }
        Ok(())
    }

    fn handle_view_by_score(&mut self) -> io::Result<()> {
        let mut records = self.store.list_all();
        rollbook_store::sort_by_score_desc(&mut records);
        writeln!(self.out, "\n--- Records Sorted by Score (High -> Low) ---")?;
        for record in records {
            writeln!(self.out, "{record}")?;
        }
        Ok(())
    }

    fn report(&mut self, err: &StoreError) -> io::Result<()> {
        writeln!(self.out, "{}", describe_store_error(err))
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.out, "{label}")?;
        self.out.flush()?;
        self.read_line()
    }

    /// `None` on end of input or when the answer is not a number.
    fn prompt_number<T: FromStr>(&mut self, label: &str) -> io::Result<Option<T>> {
        let Some(answer) = self.prompt(label)? else {
            return Ok(None);
        };
        match answer.trim().parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                writeln!(self.out, "Invalid numeric input.")?;
                Ok(None)
            }
        }
    }
}
