use citeswap::config::Config;
use citeswap::store::ReferenceDataStore;
use citeswap::validate::validate;
use std::env;
use std::io::IsTerminal;

fn main() {
    let cfg = Config::from_env();
    let brief_id = env::args().nth(1).unwrap_or_else(|| cfg.default_brief.clone());
    let store = ReferenceDataStore::new(&cfg.data_dir);
    let color = std::io::stdout().is_terminal() && env::var_os("NO_COLOR").is_none();

    for (what, path) in [
        ("Brief", store.brief_path(&brief_id)),
        ("Hallucination", store.catalog_path(&brief_id)),
    ] {
        if !path.exists() {
            let tag = if color { "\x1b[91mERROR\x1b[0m" } else { "ERROR" };
            println!("{}: {} file not found: {}", tag, what, path.display());
            std::process::exit(1);
        }
    }

    let (document, catalog) = match (store.document(&brief_id), store.catalog(&brief_id)) {
        (Ok(d), Ok(c)) => (d, c),
        (Err(err), _) | (_, Err(err)) => {
            eprintln!("load failed: {:#}", err);
            std::process::exit(1);
        }
    };

    let report = validate(&document, &catalog);
    print!("{}", report.render(color));
    std::process::exit(if report.passed() { 0 } else { 1 });
}
