use super::fake::Event;
use super::session_with;
use crate::config::Integration;
use crate::errors::E2eError;
use crate::locator::Locator;
use std::time::Duration;
use tokio::time::Instant;

const WIZARD: &str = "#mobile-wizard-content";

#[tokio::test(start_paused = true)]
async fn stable_element_resolves_once_threshold_is_exceeded() {
    let (fake, session) = session_with(Integration::None);
    fake.with(|s| {
        s.add(WIZARD);
    });

    let start = Instant::now();
    let report = session
        .query()
        .wait_until_idle(&Locator::new(WIZARD), Some(Duration::from_millis(1000)))
        .await
        .unwrap();

    // 1000 ms is reached after 4 cycles, but only the 5th exceeds it.
    assert_eq!(report.cycles, 5);
    assert_eq!(report.resets, 0);
    assert_eq!(report.idle, Duration::from_millis(1250));
    assert_eq!(start.elapsed(), Duration::from_millis(1250));
}

#[tokio::test(start_paused = true)]
async fn replacement_restarts_the_idle_window() {
    let (fake, session) = session_with(Integration::None);
    let first = fake.with(|s| s.add(WIZARD).id);
    fake.after(Duration::from_millis(600), |s| {
        s.replace(WIZARD);
    });

    let start = Instant::now();
    let report = session
        .query()
        .wait_until_idle(&Locator::new(WIZARD), Some(Duration::from_millis(1000)))
        .await
        .unwrap();

    // Detected on the poll at 750 ms, then a fresh 1250 ms window.
    assert_eq!(report.resets, 1);
    assert_eq!(report.cycles, 8);
    assert_ne!(report.element.id, first);
    assert_eq!(start.elapsed(), Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn default_threshold_is_1250ms() {
    let (fake, session) = session_with(Integration::None);
    fake.with(|s| {
        s.add(WIZARD);
    });

    let start = Instant::now();
    let report = session
        .query()
        .wait_until_idle(&Locator::new(WIZARD), None)
        .await
        .unwrap();

    assert_eq!(report.cycles, 6);
    assert_eq!(start.elapsed(), Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn nothing_to_wait_on_is_an_error() {
    let (_fake, session) = session_with(Integration::None);

    let err = session
        .query()
        .with_timeout(Duration::from_millis(500))
        .wait_until_idle(&Locator::new(WIZARD), None)
        .await
        .unwrap_err();

    assert!(matches!(err, E2eError::ElementNotFound(_)), "{err}");
}

#[tokio::test(start_paused = true)]
async fn element_removed_for_good_fails_the_wait() {
    let (fake, session) = session_with(Integration::None);
    fake.with(|s| {
        s.add(WIZARD);
    });
    fake.after(Duration::from_millis(300), |s| s.remove(WIZARD));

    let err = session
        .query()
        .with_timeout(Duration::from_millis(500))
        .wait_until_idle(&Locator::new(WIZARD), None)
        .await
        .unwrap_err();

    assert!(matches!(err, E2eError::ElementNotFound(_)), "{err}");
}

#[tokio::test(start_paused = true)]
async fn content_filter_picks_the_matching_entry() {
    let (fake, session) = session_with(Integration::None);
    fake.with(|s| {
        s.add(".ui-header").text("Font");
        s.add(".ui-header").text("Paragraph");
    });

    let locator = Locator::contains(".ui-header", "Paragraph");
    session.query().click_on_idle(&locator, None).await.unwrap();

    assert_eq!(fake.events(), vec![Event::Click(".ui-header".to_string())]);
    let clicked = session.query().resolve(&locator).await.unwrap();
    assert_eq!(clicked.text().await.unwrap(), "Paragraph");
}

#[tokio::test(start_paused = true)]
async fn input_on_idle_replaces_value_and_confirms() {
    let (fake, session) = session_with(Integration::None);
    fake.with(|s| {
        s.add("#fontsizecombobox input").attr("value", "12");
    });

    session
        .query()
        .input_on_idle("#fontsizecombobox input", "18", None)
        .await
        .unwrap();

    let selector = "#fontsizecombobox input".to_string();
    assert_eq!(
        fake.events(),
        vec![
            Event::Clear(selector.clone()),
            Event::Type {
                selector: selector.clone(),
                keys: "18".to_string(),
                force: false,
            },
            Event::Type {
                selector,
                keys: "{enter}".to_string(),
                force: false,
            },
        ]
    );
}
