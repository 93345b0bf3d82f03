use crate::infra::{FixedLocator, GridGeocoder, MarkerClassifier, SandboxGateway};
use chrono::Utc;
use clap::Args;
use petty_patrol::config::AppConfig;
use petty_patrol::error::AppError;
use petty_patrol::patrol::{
    CaptureDriver, CaptureOutcome, CaptureSource, CapturedImage, CheckoutDriver, Coordinates,
    DealClaimOutcome, JsonFileStore, MemoryStore, NoopAnalytics, PatrolSession, Persistence,
    PlateText, PriceCatalog, PriceType, SessionOptions,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type DemoSession = Mutex<PatrolSession<MemoryStore>>;

const SOUTH_BEACH: Coordinates = Coordinates {
    lat: 25.7826,
    lng: -80.1341,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Plate the scripted camera capture reads.
    #[arg(long, default_value = "MIA 305")]
    pub(crate) plate: String,
    /// Behaviors to report against the plate.
    #[arg(long = "behavior", default_values = ["speed_demon", "lane_leaper"])]
    pub(crate) behaviors: Vec<String>,
    /// QR payload scanned at the partner counter.
    #[arg(long, default_value = "XYZ_PARTNER_JOE_123")]
    pub(crate) qr: String,
    /// Skip the paid plate lookup at the end of the walkthrough.
    #[arg(long)]
    pub(crate) skip_paywall: bool,
}

#[derive(Args, Debug)]
pub(crate) struct StatsArgs {
    /// Data directory to read (defaults to PATROL_DATA_DIR)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Also list the most recent reports
    #[arg(long, default_value_t = 0)]
    pub(crate) recent: usize,
}

pub(crate) fn run_stats(args: StatsArgs) -> Result<(), AppError> {
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => AppConfig::load()?.patrol.data_dir,
    };
    let store = JsonFileStore::open(&data_dir)?;
    let state = Persistence::new(store).load();
    let stats = state.stats();

    println!("Patrol data in {}", data_dir.display());
    println!(
        "- {} reports | {} points | {} deals claimed",
        stats.reports, stats.points, stats.deals_claimed
    );
    println!(
        "- badges {}/{} ({:.0}%)",
        stats.badges_unlocked, stats.badges_total, stats.badge_progress
    );
    for badge in state.badges.iter().filter(|badge| badge.unlocked()) {
        println!("  {} {}", badge.icon, badge.name);
    }
    for report in state.live_feed().iter().take(args.recent) {
        println!(
            "- {} {} at {}",
            report.timestamp.format("%Y-%m-%d %H:%M"),
            report.plate_text,
            report.location
        );
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        plate,
        behaviors,
        qr,
        skip_paywall,
    } = args;

    let timeouts = AppConfig::load()?.patrol.capture_timeouts();
    let prices = PriceCatalog {
        one_time: "price_demo_once".to_string(),
        yearly: "price_demo_year".to_string(),
    };
    let session: DemoSession = Mutex::new(PatrolSession::new(
        Persistence::new(MemoryStore::default()),
        SessionOptions {
            debug_tools: true,
            prices: prices.clone(),
        },
        Arc::new(NoopAnalytics),
    ));
    let capture = CaptureDriver::new(
        MarkerClassifier,
        FixedLocator(SOUTH_BEACH),
        GridGeocoder,
        timeouts,
    );

    println!("Petty Patrol walkthrough");
    lock(&session).complete_onboarding();

    println!("\nCamera capture");
    let outcome = scan(&session, &capture, format!("PLATE:{plate}")).await;
    describe_capture(&outcome);
    if let CaptureOutcome::Plate { .. } = outcome {
        let mut guard = lock(&session);
        for behavior in &behaviors {
            guard.toggle_behavior(behavior.as_str());
        }
        match guard.submit_report_at(Utc::now()) {
            Ok(submitted) => {
                println!(
                    "- reported {} at {} for {}",
                    submitted.report.plate_text,
                    submitted.report.location,
                    submitted
                        .report
                        .behaviors
                        .iter()
                        .map(|id| id.0.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                if submitted.repeat_offender() {
                    println!(
                        "- repeat offender: {} earlier reports",
                        submitted.prior_reports.len()
                    );
                }
                for badge in &submitted.newly_unlocked {
                    println!("- badge unlocked: {badge}");
                }
                println!("- next view: {}", submitted.next_view.name());
            }
            Err(err) => println!("- report rejected: {err}"),
        }
    }

    println!("\nPartner deal");
    let outcome = scan(&session, &capture, format!("QR:{qr}")).await;
    describe_capture(&outcome);

    if !skip_paywall {
        println!("\nPlate lookup");
        let target = PlateText::normalize(&plate);
        let first_try = lock(&session).check_plate(&target, Utc::now());
        match first_try {
            Ok(reports) => println!("- {} reports on file", reports.len()),
            Err(err) => {
                println!("- lookup blocked: {err}");
                let checkout = CheckoutDriver::new(SandboxGateway { prices });
                let started = match checkout.start(&session, PriceType::OneTime).await {
                    Ok(started) => started,
                    Err(err) => {
                        println!("- checkout failed: {err}");
                        return Ok(());
                    }
                };
                println!("- checkout redirect: {}", started.redirect_url);
                match checkout
                    .complete(&session, &started.session_id, Utc::now())
                    .await
                {
                    Ok(price_type) => println!("- entitlement granted: {price_type:?}"),
                    Err(err) => println!("- payment not confirmed: {err}"),
                }
                match lock(&session).check_plate(&target, Utc::now()) {
                    Ok(reports) => println!("- {} reports on file for {target}", reports.len()),
                    Err(err) => println!("- lookup still blocked: {err}"),
                }
            }
        }
    }

    let mut guard = lock(&session);
    let stats = guard.stats();
    println!(
        "\nSession summary: {} reports | {} points | {}/{} badges | {} deals claimed",
        stats.reports, stats.points, stats.badges_unlocked, stats.badges_total, stats.deals_claimed
    );
    for notice in guard.drain_notices() {
        println!("- notice: {}", notice.message);
    }
    println!("- final view: {}", guard.view().name());

    Ok(())
}

// The demo owns the only handle, so a poisoned lock still holds usable state.
fn lock(session: &DemoSession) -> MutexGuard<'_, PatrolSession<MemoryStore>> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn scan(
    session: &DemoSession,
    capture: &CaptureDriver<MarkerClassifier, FixedLocator, GridGeocoder>,
    payload: String,
) -> CaptureOutcome {
    let ticket = lock(session).begin_capture(CaptureSource::Camera);
    capture
        .analyze(session, ticket, CapturedImage::new(payload.into_bytes(), "image/png"))
        .await
}

fn describe_capture(outcome: &CaptureOutcome) {
    match outcome {
        CaptureOutcome::Plate { plate } => println!("- plate read: {plate}"),
        CaptureOutcome::Deal { claim } => match claim {
            DealClaimOutcome::Claimed { deal } => {
                println!("- claimed {} at {}", deal.offer, deal.partner_name)
            }
            DealClaimOutcome::AlreadyClaimed { deal } => {
                println!("- {} already claimed", deal.offer)
            }
            DealClaimOutcome::NoMatch => println!("- no partner deal matches that code"),
        },
        CaptureOutcome::Rejected { notice } => println!("- capture rejected: {notice}"),
        CaptureOutcome::Stale => println!("- capture was superseded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_walkthrough_runs_end_to_end() {
        let args = DemoArgs {
            plate: "MIA 305".to_string(),
            behaviors: vec!["speed_demon".to_string()],
            qr: "XYZ_PARTNER_JOE_123".to_string(),
            skip_paywall: false,
        };
        assert!(run_demo(args).await.is_ok());
    }
}
