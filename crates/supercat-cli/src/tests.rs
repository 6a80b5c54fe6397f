use supercat_core::JobAction;

use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["supercat", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["supercat", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn parses_db_seed_categories_command() {
    let cli = Cli::try_parse_from(["supercat", "db", "seed-categories"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::SeedCategories
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["supercat"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn run_defaults_to_discovery() {
    let cli = Cli::try_parse_from(["supercat", "run", "--store", "coto"]).unwrap();
    let Some(Commands::Run { job, fixtures }) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(job.store, "coto");
    assert_eq!(job.action, JobAction::DiscoverCategories);
    assert!(job.url.is_none());
    assert!(fixtures.is_none());
}

#[test]
fn run_accepts_fixtures_and_category_args() {
    let cli = Cli::try_parse_from([
        "supercat",
        "run",
        "--store",
        "jumbo",
        "--action",
        "scrape-products",
        "--url",
        "https://www.jumbo.com.ar/lacteos",
        "--path",
        "Lácteos",
        "--fixtures",
        "./fixtures/jumbo",
    ])
    .unwrap();
    let Some(Commands::Run { job, fixtures }) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(job.action, JobAction::ScrapeProducts);
    assert_eq!(job.path.as_deref(), Some("Lácteos"));
    assert_eq!(fixtures, Some(PathBuf::from("./fixtures/jumbo")));
}

#[test]
fn enqueue_accepts_screaming_case_action() {
    let cli = Cli::try_parse_from([
        "supercat",
        "enqueue",
        "--store",
        "dia",
        "--action",
        "CRAWL_CATEGORY",
        "--url",
        "https://diaonline.supermercadosdia.com.ar/almacen",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Enqueue { job }) if job.action == JobAction::CrawlCategory
    ));
}

#[test]
fn unknown_action_is_rejected() {
    let err = Cli::try_parse_from(["supercat", "run", "--store", "vea", "--action", "explode"]);
    assert!(err.is_err());
}

#[test]
fn worker_flags() {
    let cli = Cli::try_parse_from(["supercat", "worker", "--concurrency", "4", "--once"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Worker {
            concurrency: Some(4),
            once: true
        })
    ));
}

#[test]
fn match_brand_requires_title() {
    assert!(Cli::try_parse_from(["supercat", "match-brand"]).is_err());
    let cli = Cli::try_parse_from([
        "supercat",
        "match-brand",
        "--title",
        "Gaseosa Coca-Cola 2.25 L",
        "--store",
        "carrefour",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::MatchBrand { store: Some(ref s), .. }) if s == "carrefour"
    ));
}

#[test]
fn map_category_takes_store_name_and_path() {
    let cli = Cli::try_parse_from([
        "supercat",
        "map-category",
        "--store",
        "coto",
        "--name",
        "Aceites",
        "--path",
        "Almacén",
    ])
    .unwrap();
    let Some(Commands::MapCategory { store, name, path }) = cli.command else {
        panic!("expected map-category command");
    };
    assert_eq!((store.as_str(), name.as_str()), ("coto", "Aceites"));
    assert_eq!(path.as_deref(), Some("Almacén"));
}
