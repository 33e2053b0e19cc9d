use super::*;
use coupon_core::{CatalogStrategy, WidgetConfig};
use shared::domain::{Coupon, CouponKind};

#[test]
fn parses_session_steps() {
    assert_eq!(
        "apply:FLAT20".parse::<Step>().expect("apply"),
        Step::Apply("FLAT20".into())
    );
    assert_eq!(
        " Remove : SAVE10".parse::<Step>().expect("remove"),
        Step::Remove("SAVE10".into())
    );
    assert!("apply:".parse::<Step>().is_err());
    assert!("FLAT20".parse::<Step>().is_err());
    assert!("toggle:FLAT20".parse::<Step>().is_err());
}

#[test]
fn cli_accepts_repeated_flags() {
    let args = Args::try_parse_from([
        "checkout-cli",
        "--applied",
        "FLAT20",
        "--reject",
        "BOGUS",
        "session",
        "--step",
        "apply:BOGUS",
        "--step",
        "remove:FLAT20",
    ])
    .expect("parse");
    assert_eq!(args.applied, vec!["FLAT20".to_string()]);
    match args.command {
        Command::Session { steps } => assert_eq!(
            steps,
            vec![Step::Apply("BOGUS".into()), Step::Remove("FLAT20".into())]
        ),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn session_reports_rollback_outcome() {
    let host = Arc::new(
        InMemoryCheckoutHost::new()
            .with_applied(["FLAT20"])
            .with_rejected(["BOGUS"]),
    );
    let widget = CouponWidget::new(
        host,
        CatalogStrategy::Static(vec![Coupon::new("FLAT20", "20% off", CouponKind::Percentage)]),
        WidgetConfig::default(),
    );
    widget.load_catalog().await;

    let report = run_step(&widget, &Step::Apply("BOGUS".into())).await;

    assert_eq!(report.step, "apply:BOGUS");
    assert!(report.outcome.starts_with("failed: host rejected add of BOGUS"));
    assert!(report.outcome.ends_with("restored FLAT20"));
    assert_eq!(report.snapshot.active_discounts.len(), 1);
    assert_eq!(report.snapshot.active_discounts[0].code, "FLAT20");
}
