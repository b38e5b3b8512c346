mod common;

use chrono::Duration;
use common::{
    activated_record, codec, days_from_today, machine, other_machine, t0, today, volume_record,
    FakeNetworkTime, FakeRefresh, Harness, RefreshOutcome, PRODUCT_ID,
};
use keyward_license::{
    run_checks, LicenseCodec, LicenseConfig, LicenseError, LicenseRecord, LicenseType,
    ProductOptionType, RefreshPolicy, SystemValidation, ValidationContext,
};
use pretty_assertions::assert_eq;
use std::fs;

fn refreshing(h: &mut Harness) {
    h.config.refresh = RefreshPolicy {
        enabled: true,
        attempt_frequency_days: 7,
        require_frequency_days: 30,
        volume_refresh_enabled: false,
    };
}

// ── Check ordering ───────────────────────────────────────────────

#[test]
fn checks_stop_at_first_failure() {
    let config = LicenseConfig::in_dir(PRODUCT_ID, "/tmp/keyward");
    let mut record = LicenseRecord::unlicensed(PRODUCT_ID + 1, today(), t0());
    record.authorized_identifiers = other_machine();
    let codec = codec();
    let ctx = ValidationContext {
        record: &record,
        config: &config,
        now: t0(),
        current_identifiers: machine(),
        aliases: &[],
        codec: &codec,
        network_time: None,
    };

    let product_first = [
        SystemValidation::ProductIdentity,
        SystemValidation::SystemIdentifierMatch,
    ];
    assert!(matches!(
        run_checks(&product_first, &ctx),
        Err(LicenseError::ProductMismatch { .. })
    ));

    let identifiers_first = [
        SystemValidation::SystemIdentifierMatch,
        SystemValidation::ProductIdentity,
    ];
    assert_eq!(
        run_checks(&identifiers_first, &ctx),
        Err(LicenseError::SystemIdentifiersMismatch)
    );

    assert!(run_checks(&[], &ctx).is_ok());
}

#[test]
fn clock_tamper_allows_configured_tolerance() {
    let config = LicenseConfig::in_dir(PRODUCT_ID, "/tmp/keyward");
    let mut record = LicenseRecord::unlicensed(PRODUCT_ID, today(), t0());
    record.last_updated = Some(t0());
    let codec = codec();
    let ctx_at = |now| ValidationContext {
        record: &record,
        config: &config,
        now,
        current_identifiers: machine(),
        aliases: &[],
        codec: &codec,
        network_time: None,
    };

    let within = ctx_at(t0() - Duration::minutes(9));
    assert!(SystemValidation::ClockTamper.check(&within).is_ok());

    let beyond = ctx_at(t0() - Duration::minutes(11));
    assert!(matches!(
        SystemValidation::ClockTamper.check(&beyond),
        Err(LicenseError::ClockTampered { .. })
    ));
}

// ── Standard path ────────────────────────────────────────────────

#[test]
fn license_copied_to_another_machine_fails() {
    let h = Harness::new();
    h.license().create_fresh_evaluation().unwrap();

    let mut copied = h.license_on(other_machine());
    assert_eq!(
        copied.initialize(),
        Err(LicenseError::SystemIdentifiersMismatch)
    );
}

#[test]
fn license_for_another_product_fails() {
    let h = Harness::without_aliases();
    let mut foreign = activated_record(LicenseType::FullNonExpiring, t0());
    foreign.product_id = 9999;
    fs::create_dir_all(h.license_path().parent().unwrap()).unwrap();
    fs::write(h.license_path(), codec().encode(&foreign).unwrap()).unwrap();

    let mut license = h.license();
    assert_eq!(
        license.initialize(),
        Err(LicenseError::ProductMismatch {
            expected: PRODUCT_ID,
            found: 9999
        })
    );
}

#[test]
fn back_dated_clock_is_detected() {
    let h = Harness::new();
    h.license().create_fresh_evaluation().unwrap();

    h.clock.set(t0() - Duration::days(1));
    let mut license = h.license();
    assert!(matches!(
        license.initialize(),
        Err(LicenseError::ClockTampered { .. })
    ));
}

#[test]
fn window_is_enforced_for_time_limited_licenses() {
    let h = Harness::new();
    let mut record = activated_record(LicenseType::TimeLimited, t0());
    record.effective_start_date = days_from_today(2);
    record.effective_end_date = days_from_today(12);
    let mut license = h.install(&record);

    assert_eq!(license.validate(), Err(LicenseError::NotEffectiveYet));

    h.clock.advance(Duration::days(2));
    assert!(license.validate().is_ok());

    h.clock.advance(Duration::days(10));
    assert_eq!(
        license.validate(),
        Err(LicenseError::Expired(days_from_today(12).to_string()))
    );
}

#[test]
fn full_license_never_expires() {
    let h = Harness::new();
    let mut record = activated_record(LicenseType::FullNonExpiring, t0());
    record.effective_end_date = days_from_today(1);
    let mut license = h.install(&record);

    h.clock.advance(Duration::days(1000));
    assert!(license.validate().is_ok());
}

#[test]
fn unvalidated_downloadable_license_is_not_effective() {
    let h = Harness::new();
    let mut record = activated_record(LicenseType::FullNonExpiring, t0());
    record.product_option = ProductOptionType::DownloadableLicenseWithTriggerCodeValidation;
    let mut license = h.install(&record);

    assert_eq!(license.validate(), Err(LicenseError::NotEffectiveYet));
    assert_eq!(license.last_error(), Some(&LicenseError::NotEffectiveYet));
}

// ── Alias consistency ────────────────────────────────────────────

#[test]
fn rolled_back_license_file_is_detected() {
    let h = Harness::new();
    let mut license = h.license();
    license.create_fresh_evaluation().unwrap();
    let snapshot = fs::read(h.license_path()).unwrap();

    h.clock.advance(Duration::hours(1));
    license.save_license_file().unwrap();
    fs::write(h.license_path(), snapshot).unwrap();

    let mut restarted = h.license();
    assert!(matches!(
        restarted.initialize(),
        Err(LicenseError::AliasInvalid(_))
    ));
}

#[test]
fn corrupt_aliases_fail_validation() {
    let h = Harness::new();
    let mut license = h.license();
    license.create_fresh_evaluation().unwrap();
    for alias in &h.config.alias_paths {
        fs::write(alias, b"scrambled").unwrap();
    }

    assert!(matches!(
        license.validate(),
        Err(LicenseError::AliasInvalid(_))
    ));
}

#[test]
fn missing_aliases_alone_do_not_fail() {
    let h = Harness::new();
    let mut license = h.license();
    license.create_fresh_evaluation().unwrap();
    for alias in &h.config.alias_paths {
        fs::remove_file(alias).unwrap();
    }

    assert!(license.validate().is_ok());
}

// ── Refresh ──────────────────────────────────────────────────────

#[test]
fn due_refresh_adopts_and_persists_new_signature() {
    let mut h = Harness::new();
    refreshing(&mut h);
    h.install(&activated_record(LicenseType::FullNonExpiring, t0() - Duration::days(10)));

    let refresh = FakeRefresh::new(RefreshOutcome::Resign(t0()));
    let mut license = h.license().with_refresh_service(refresh.clone());

    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 1);
    assert_eq!(license.record().signature_date, t0());
    assert_eq!(h.stored().signature_date, t0());
}

#[test]
fn refresh_not_due_is_not_attempted() {
    let mut h = Harness::new();
    refreshing(&mut h);
    h.install(&activated_record(LicenseType::FullNonExpiring, t0() - Duration::days(2)));

    let refresh = FakeRefresh::new(RefreshOutcome::Resign(t0()));
    let mut license = h.license().with_refresh_service(refresh.clone());

    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 0);
}

#[test]
fn unreachable_service_is_tolerated_until_required() {
    let mut h = Harness::new();
    refreshing(&mut h);
    h.install(&activated_record(LicenseType::FullNonExpiring, t0() - Duration::days(10)));

    let refresh = FakeRefresh::new(RefreshOutcome::Unreachable);
    let mut license = h.license().with_refresh_service(refresh.clone());
    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 1);

    h.clock.advance(Duration::days(20));
    assert!(matches!(
        license.validate(),
        Err(LicenseError::RefreshFailed(reason)) if reason.contains("unreachable")
    ));
}

#[test]
fn missing_service_counts_as_unreachable() {
    let mut h = Harness::new();
    refreshing(&mut h);
    h.install(&activated_record(LicenseType::FullNonExpiring, t0() - Duration::days(10)));

    let mut license = h.license();
    assert!(license.initialize().is_ok());
}

#[test]
fn rejected_refresh_fails_validation() {
    let mut h = Harness::new();
    refreshing(&mut h);
    h.install(&activated_record(LicenseType::FullNonExpiring, t0() - Duration::days(10)));

    let refresh = FakeRefresh::new(RefreshOutcome::Rejected);
    let mut license = h.license().with_refresh_service(refresh);
    assert!(matches!(
        license.initialize(),
        Err(LicenseError::RefreshFailed(reason)) if reason.contains("license revoked")
    ));
}

#[test]
fn evaluations_are_never_refreshed() {
    let mut h = Harness::new();
    refreshing(&mut h);
    h.license().create_fresh_evaluation().unwrap();
    h.clock.advance(Duration::days(20));

    let refresh = FakeRefresh::new(RefreshOutcome::Rejected);
    let mut license = h.license().with_refresh_service(refresh.clone());
    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 0);
}

#[test]
fn alias_failure_forces_refresh() {
    let mut h = Harness::new();
    refreshing(&mut h);
    let mut installed = h.install(&activated_record(LicenseType::FullNonExpiring, t0()));
    let snapshot = fs::read(h.license_path()).unwrap();
    h.clock.advance(Duration::hours(1));
    installed.save_license_file().unwrap();
    fs::write(h.license_path(), snapshot).unwrap();

    // Signed today, so no refresh would be due on schedule.
    let refresh = FakeRefresh::new(RefreshOutcome::Resign(t0() + Duration::hours(1)));
    let mut license = h.license().with_refresh_service(refresh.clone());
    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 1);
}

#[test]
fn alias_error_wins_over_refresh_error() {
    let mut h = Harness::new();
    refreshing(&mut h);
    let mut installed = h.install(&activated_record(LicenseType::FullNonExpiring, t0()));
    let snapshot = fs::read(h.license_path()).unwrap();
    h.clock.advance(Duration::hours(1));
    installed.save_license_file().unwrap();
    fs::write(h.license_path(), snapshot).unwrap();

    let refresh = FakeRefresh::new(RefreshOutcome::Unreachable);
    let mut license = h.license().with_refresh_service(refresh);
    assert!(matches!(
        license.initialize(),
        Err(LicenseError::AliasInvalid(_))
    ));
}

// ── Volume refresh ───────────────────────────────────────────────

fn volume_refreshing(h: &mut Harness) {
    refreshing(h);
    h.config.refresh.volume_refresh_enabled = true;
}

/// Issues an activated volume license signed `days_ago` days before `t0()`.
fn issue_activated_volume(h: &Harness, days_ago: i64) {
    let mut volume = volume_record(
        ProductOptionType::VolumeLicense,
        42,
        t0() - Duration::days(days_ago),
    );
    volume.installation_id = "INST-9".to_string();
    h.issue_volume(&volume);
}

#[test]
fn volume_without_installation_is_never_refreshed() {
    let mut h = Harness::new();
    volume_refreshing(&mut h);
    h.issue_volume(&volume_record(
        ProductOptionType::VolumeLicense,
        42,
        t0() - Duration::days(60),
    ));

    let refresh = FakeRefresh::new(RefreshOutcome::Rejected);
    let mut license = h.license().with_refresh_service(refresh.clone());

    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 0);
}

#[test]
fn volume_refresh_waits_until_due() {
    let mut h = Harness::new();
    volume_refreshing(&mut h);
    issue_activated_volume(&h, 2);

    let refresh = FakeRefresh::new(RefreshOutcome::Rejected);
    let mut license = h.license().with_refresh_service(refresh.clone());

    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 0);
}

#[test]
fn volume_refresh_is_off_unless_enabled() {
    let mut h = Harness::new();
    refreshing(&mut h);
    issue_activated_volume(&h, 60);

    let refresh = FakeRefresh::new(RefreshOutcome::Rejected);
    let mut license = h.license().with_refresh_service(refresh.clone());

    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 0);
}

#[test]
fn refreshed_volume_license_is_written_back() {
    let mut h = Harness::new();
    volume_refreshing(&mut h);
    issue_activated_volume(&h, 10);

    let refresh = FakeRefresh::new(RefreshOutcome::Resign(t0()));
    let mut license = h.license().with_refresh_service(refresh.clone());

    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 1);
    let written = codec().decode(&fs::read(h.volume_path()).unwrap()).unwrap();
    assert_eq!(written.signature_date, t0());
    assert_eq!(written.license_id, 42);

    // The new signature date is not due again.
    assert!(license.validate().is_ok());
    assert_eq!(refresh.calls(), 1);
}

#[test]
fn unreachable_volume_service_is_tolerated_until_required() {
    let mut h = Harness::new();
    volume_refreshing(&mut h);
    issue_activated_volume(&h, 10);

    let refresh = FakeRefresh::new(RefreshOutcome::Unreachable);
    let mut license = h.license().with_refresh_service(refresh.clone());
    assert!(license.initialize().is_ok());
    assert_eq!(refresh.calls(), 1);

    h.clock.advance(Duration::days(20));
    assert!(matches!(
        license.validate(),
        Err(LicenseError::RefreshFailed(reason)) if reason.contains("unreachable")
    ));
    assert_eq!(refresh.calls(), 2);
}

#[test]
fn rejected_volume_refresh_fails_validation() {
    let mut h = Harness::new();
    volume_refreshing(&mut h);
    issue_activated_volume(&h, 10);

    let refresh = FakeRefresh::new(RefreshOutcome::Rejected);
    let mut license = h.license().with_refresh_service(refresh);
    assert!(matches!(
        license.initialize(),
        Err(LicenseError::RefreshFailed(reason)) if reason.contains("license revoked")
    ));
}

// ── Network time ─────────────────────────────────────────────────

#[test]
fn network_time_is_checked_for_time_bound_licenses() {
    let mut h = Harness::new();
    h.config.network_time_check = true;

    let mut unconfigured = h.license();
    unconfigured.create_fresh_evaluation().unwrap();
    assert!(matches!(
        unconfigured.validate(),
        Err(LicenseError::NetworkTime(_))
    ));

    let mut close = h
        .license()
        .with_network_time_source(FakeNetworkTime(Some(t0() + Duration::hours(3))));
    assert!(close.initialize().is_ok());

    let mut skewed = h
        .license()
        .with_network_time_source(FakeNetworkTime(Some(t0() + Duration::days(2))));
    assert_eq!(
        skewed.initialize(),
        Err(LicenseError::NetworkTimeSkew {
            skew_secs: -2 * 24 * 60 * 60
        })
    );

    let mut offline = h.license().with_network_time_source(FakeNetworkTime(None));
    assert!(matches!(
        offline.initialize(),
        Err(LicenseError::NetworkTime(_))
    ));
}

#[test]
fn network_time_is_skipped_for_full_licenses() {
    let mut h = Harness::new();
    h.config.network_time_check = true;
    let mut license = h.install(&activated_record(LicenseType::FullNonExpiring, t0()));
    assert!(license.validate().is_ok());
}
