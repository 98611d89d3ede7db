use std::sync::{Arc, Mutex};
use std::time::Duration;

use wallet_session::{
    Address, ConnectionStatus, MockWallet, NetworkRegistry, ProviderError, Session, SessionConfig,
    SessionError, SessionManager, WalletProvider,
};

const ALICE: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
const BOB: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";
const ONE_DEV: u128 = 1_000_000_000_000_000_000;

fn setup(wallet: &Arc<MockWallet>) -> SessionManager {
    setup_with(wallet, SessionConfig::default())
}

fn setup_with(wallet: &Arc<MockWallet>, config: SessionConfig) -> SessionManager {
    SessionManager::new(
        config,
        NetworkRegistry::moonbeam(),
        Some(wallet.clone() as Arc<dyn WalletProvider>),
    )
}

fn no_add_network() -> SessionConfig {
    SessionConfig {
        add_network_on_connect: false,
        ..SessionConfig::default()
    }
}

fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

async fn wait_until<F>(manager: &SessionManager, predicate: F) -> Session
where
    F: Fn(&Session) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let session = manager.session();
            if predicate(&session) {
                return session;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session did not reach expected state")
}

#[tokio::test]
async fn test_connect_on_supported_network() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    wallet.set_balance(ALICE, 5 * ONE_DEV);
    let manager = setup(&wallet);

    let outcome = manager.connect("Moonbase Alpha").await.unwrap();
    assert!(outcome.connected);
    assert_eq!(outcome.network_name, "Moonbase Alpha");

    let session = manager.session();
    assert_eq!(session.status, ConnectionStatus::Connected);
    assert_eq!(session.account, Some(addr(ALICE)));
    assert_eq!(session.balance_display, "5");
    assert!(wallet.added_networks().is_empty());
    assert_eq!(manager.active_network().unwrap().unwrap().chain_id, 1287);
}

#[tokio::test]
async fn test_connect_on_unknown_chain_is_wrong_network() {
    let wallet = Arc::new(MockWallet::new(9999).with_accounts(&[ALICE]));
    let manager = setup_with(&wallet, no_add_network());

    let outcome = manager.connect("Moonbase Alpha").await.unwrap();
    assert!(outcome.connected);
    assert_eq!(outcome.network_name, "Moonbase Alpha");

    let session = manager.session();
    assert_eq!(session.status, ConnectionStatus::ConnectedWrongNetwork);
    assert_eq!(session.network_name, "Moonbase Alpha");
    assert_eq!(session.account, Some(addr(ALICE)));
    assert_eq!(
        manager.active_network(),
        Err(SessionError::NetworkMismatch { chain_id: 9999 })
    );
}

#[tokio::test]
async fn test_connect_adds_and_switches_network() {
    let wallet = Arc::new(MockWallet::new(9999).with_accounts(&[ALICE]));
    let manager = setup(&wallet);

    let outcome = manager.connect("Moonbase Alpha").await.unwrap();
    assert!(outcome.connected);
    assert_eq!(manager.session().status, ConnectionStatus::Connected);

    let added = wallet.added_networks();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0]["chainId"], "0x507");
    assert_eq!(wallet.chain_id(), 1287);
}

#[tokio::test]
async fn test_add_network_refused_keeps_wrong_network() {
    let wallet = Arc::new(MockWallet::new(9999).with_accounts(&[ALICE]));
    wallet.fail_add_network(Some(ProviderError::user_rejected()));
    let manager = setup(&wallet);

    let outcome = manager.connect("Moonbase Alpha").await.unwrap();
    assert!(outcome.connected);
    assert_eq!(manager.session().status, ConnectionStatus::ConnectedWrongNetwork);
}

#[tokio::test]
async fn test_declined_prompt_is_not_an_error() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    wallet.decline_prompts(true);
    let manager = setup(&wallet);

    let outcome = manager.connect("Moonbase Alpha").await.unwrap();
    assert!(!outcome.connected);

    let session = manager.session();
    assert_eq!(session.status, ConnectionStatus::Disconnected);
    assert!(session.account.is_none());
    assert_eq!(wallet.calls("eth_chainId"), 0);
}

#[tokio::test]
async fn test_failed_prompt_surfaces_rpc_error() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    wallet.fail_prompts(Some(ProviderError::new(-32002, "Request already pending")));
    let manager = setup(&wallet);

    let err = manager.connect("Moonbase Alpha").await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Rpc {
            code: -32002,
            message: "Request already pending".to_string()
        }
    );
    assert_eq!(manager.session().status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_incompatible_provider() {
    let wallet: Arc<dyn WalletProvider> = Arc::new(MockWallet::incompatible());
    let manager =
        SessionManager::new(SessionConfig::default(), NetworkRegistry::moonbeam(), Some(wallet));

    let err = manager.connect("Moonbase Alpha").await.unwrap_err();
    assert_eq!(err, SessionError::UnsupportedProvider);
    assert_eq!(err.to_string(), "Other ethereum wallet did not support");
}

#[tokio::test]
async fn test_listed_but_unregistered_network_connects_wrong_network() {
    // Moonriver is offered to users but has no descriptor
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    let manager = setup(&wallet);

    let outcome = manager.connect("Moonriver").await.unwrap();
    assert!(outcome.connected);
    assert_eq!(outcome.network_name, "Moonbase Alpha");
    assert!(wallet.added_networks().is_empty());
}

#[tokio::test]
async fn test_legacy_chain_id_fallback() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    wallet.set_legacy_chain_id(true);
    let manager = setup(&wallet);

    manager.connect("Moonbase Alpha").await.unwrap();
    assert_eq!(manager.session().status, ConnectionStatus::Connected);
    assert!(wallet.calls("net_version") >= 1);
}

#[tokio::test]
async fn test_restore_without_prompt() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    wallet.authorize();
    let manager = setup(&wallet);

    let session = manager.restore().await.unwrap();
    assert_eq!(session.status, ConnectionStatus::Connected);
    assert_eq!(session.account, Some(addr(ALICE)));
    assert_eq!(wallet.calls("eth_requestAccounts"), 0);
}

#[tokio::test]
async fn test_restore_unauthorized_stays_disconnected() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    let manager = setup(&wallet);

    let session = manager.restore().await.unwrap();
    assert_eq!(session.status, ConnectionStatus::Disconnected);
    assert_eq!(wallet.calls("eth_requestAccounts"), 0);
}

#[tokio::test]
async fn test_empty_accounts_disconnects() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    wallet.set_balance(ALICE, ONE_DEV);
    let manager = setup(&wallet);
    manager.connect("Moonbase Alpha").await.unwrap();
    assert_eq!(manager.session().balance_display, "1");

    manager.handle_accounts_changed(vec![]).await;
    let session = manager.session();
    assert_eq!(session.status, ConnectionStatus::Disconnected);
    assert!(session.account.is_none());
    assert_eq!(session.balance_display, "");
}

#[tokio::test]
async fn test_account_switch_refreshes_balance() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    wallet.set_balance(ALICE, ONE_DEV);
    wallet.set_balance(BOB, 3 * ONE_DEV);
    let manager = setup(&wallet);
    manager.connect("Moonbase Alpha").await.unwrap();

    manager.handle_accounts_changed(vec![addr(BOB)]).await;
    let session = manager.session();
    assert_eq!(session.account, Some(addr(BOB)));
    assert_eq!(session.balance_display, "3");
}

#[tokio::test]
async fn test_chain_change_to_unknown_keeps_network_name() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    let manager = setup(&wallet);
    manager.connect("Moonbase Alpha").await.unwrap();

    wallet.set_chain_id(9999);
    manager.handle_chain_changed(9999).await;
    let session = manager.session();
    assert_eq!(session.status, ConnectionStatus::ConnectedWrongNetwork);
    assert_eq!(session.network_name, "Moonbase Alpha");
    assert_eq!(session.account, Some(addr(ALICE)));

    wallet.set_chain_id(1281);
    manager.handle_chain_changed(1281).await;
    let session = manager.session();
    assert_eq!(session.status, ConnectionStatus::Connected);
    assert_eq!(session.network_name, "Moonbeam Dev");
}

#[tokio::test]
async fn test_chain_change_while_disconnected_only_records() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    let manager = setup(&wallet);

    manager.handle_chain_changed(1281).await;
    let session = manager.session();
    assert_eq!(session.status, ConnectionStatus::Disconnected);
    assert_eq!(session.network_name, "Moonbeam Dev");
    assert_eq!(wallet.calls("eth_accounts"), 0);
}

#[tokio::test]
async fn test_event_order_converges() {
    async fn run(accounts_first: bool) -> Session {
        let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
        wallet.set_balance(BOB, 2 * ONE_DEV);
        let manager = setup(&wallet);
        manager.connect("Moonbase Alpha").await.unwrap();

        // The wallet moves first, then reports both changes
        wallet.set_accounts(&[BOB]);
        wallet.set_chain_id(1281);
        if accounts_first {
            manager.handle_accounts_changed(vec![addr(BOB)]).await;
            manager.handle_chain_changed(1281).await;
        } else {
            manager.handle_chain_changed(1281).await;
            manager.handle_accounts_changed(vec![addr(BOB)]).await;
        }
        manager.session()
    }

    let a = run(true).await;
    let b = run(false).await;
    assert_eq!(a, b);
    assert_eq!(a.status, ConnectionStatus::Connected);
    assert_eq!(a.network_name, "Moonbeam Dev");
    assert_eq!(a.account, Some(addr(BOB)));
    assert_eq!(a.balance_display, "2");
}

#[tokio::test]
async fn test_duplicate_events_are_idempotent() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    let manager = setup(&wallet);
    manager.connect("Moonbase Alpha").await.unwrap();
    let before = manager.session();

    manager.handle_chain_changed(1287).await;
    manager.handle_chain_changed(1287).await;
    manager.handle_accounts_changed(vec![addr(ALICE)]).await;
    assert_eq!(manager.session(), before);
}

#[tokio::test]
async fn test_session_change_notifications() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    let manager = setup(&wallet);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = manager.on_session_change(move |session| {
        sink.lock().unwrap().push(session.status);
    });

    manager.connect("Moonbase Alpha").await.unwrap();
    manager.handle_accounts_changed(vec![]).await;
    subscription.unsubscribe();
    manager.connect("Moonbase Alpha").await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&ConnectionStatus::Connecting));
    assert!(seen.contains(&ConnectionStatus::Connected));
    assert_eq!(seen.last(), Some(&ConnectionStatus::Disconnected));
    assert_eq!(
        seen.iter().filter(|s| **s == ConnectionStatus::Disconnected).count(),
        1
    );
}

#[tokio::test]
async fn test_event_pump_applies_wallet_events() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    let manager = setup(&wallet);
    manager.connect("Moonbase Alpha").await.unwrap();
    let pump = manager.listen().unwrap();
    assert_eq!(wallet.listener_count(), 1);

    wallet.switch_chain(1281);
    let session = wait_until(&manager, |s| s.network_name == "Moonbeam Dev").await;
    assert_eq!(session.status, ConnectionStatus::Connected);

    wallet.switch_chain(9999);
    wait_until(&manager, |s| s.status == ConnectionStatus::ConnectedWrongNetwork).await;

    wallet.emit_accounts_changed(&[]);
    let session = wait_until(&manager, |s| s.status == ConnectionStatus::Disconnected).await;
    assert_eq!(session.network_name, "Moonbeam Dev");

    pump.shutdown().await;
    assert_eq!(wallet.listener_count(), 0);
}

#[tokio::test]
async fn test_event_pump_drops_malformed_events() {
    let wallet = Arc::new(MockWallet::new(1287).with_accounts(&[ALICE]));
    let manager = setup(&wallet);
    manager.connect("Moonbase Alpha").await.unwrap();
    let before = manager.session();
    let pump = manager.listen().unwrap();

    wallet.emit_chain_changed("not-a-chain");
    wallet.emit_accounts_changed(&["0x1234"]);
    pump.shutdown().await;

    assert_eq!(manager.session(), before);
}

#[tokio::test]
async fn test_listen_without_provider() {
    let manager = SessionManager::new(SessionConfig::default(), NetworkRegistry::moonbeam(), None);
    assert!(matches!(manager.listen(), Err(SessionError::ProviderAbsent)));
}
