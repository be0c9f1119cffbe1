extern crate std;

use soroban_sdk::{
    symbol_short,
    testutils::{Address as _, Events, Ledger},
    token, vec, Address, Env, IntoVal, String, TryIntoVal, Val, Vec,
};

use crate::{
    FundsReleased, MaungDao, MaungDaoClient, ProposalApproved, ProposalCreated, ProposalDetails,
    ProposalRejected, TreasuryDeposit, Voted,
};

fn setup() -> (Env, MaungDaoClient<'static>, token::StellarAssetClient<'static>) {
    let env = Env::default();
    env.mock_all_auths();

    let issuer = Address::generate(&env);
    let asset = env.register_stellar_asset_contract_v2(issuer);
    let contract_id = env.register(MaungDao, (asset.address(),));
    let client = MaungDaoClient::new(&env, &contract_id);
    let sac = token::StellarAssetClient::new(&env, &asset.address());
    (env, client, sac)
}

fn create(env: &Env, client: &MaungDaoClient, proposer: &Address, amount: i128) -> u64 {
    client.create_funding_proposal(
        proposer,
        &String::from_str(env, "Batik Studio"),
        &String::from_str(env, "Creative Industry"),
        &String::from_str(env, "Hand-drawn batik workshop"),
        &amount,
        &6,
    )
}

/// The last `n` events published by the DAO contract itself, oldest first.
fn last_dao_events(env: &Env, client: &MaungDaoClient, n: u32) -> std::vec::Vec<(Vec<Val>, Val)> {
    let ours: std::vec::Vec<(Vec<Val>, Val)> = env
        .events()
        .all()
        .iter()
        .filter(|(contract, _, _)| *contract == client.address)
        .map(|(_, topics, data)| (topics, data))
        .collect();
    ours[ours.len() - n as usize..].to_vec()
}

#[test]
fn test_proposal_created_and_details_events() {
    let (env, client, _) = setup();
    env.ledger().with_mut(|li| li.timestamp = 500);
    let proposer = Address::generate(&env);
    let id = create(&env, &client, &proposer, 12_000);

    let events = last_dao_events(&env, &client, 2);

    // Topic: (symbol_short!("created"), id)
    let (topics, data) = &events[0];
    let expected_topics = vec![
        &env,
        symbol_short!("created").into_val(&env),
        id.into_val(&env),
    ];
    assert_eq!(*topics, expected_topics);
    let created: ProposalCreated = data.try_into_val(&env).unwrap();
    assert_eq!(
        created,
        ProposalCreated {
            id,
            proposer: proposer.clone(),
            requested_amount: 12_000,
        }
    );

    let (topics, data) = &events[1];
    let expected_topics = vec![
        &env,
        symbol_short!("details").into_val(&env),
        id.into_val(&env),
    ];
    assert_eq!(*topics, expected_topics);
    let details: ProposalDetails = data.try_into_val(&env).unwrap();
    assert_eq!(details.id, id);
    assert_eq!(details.category, String::from_str(&env, "Creative Industry"));
    assert_eq!(details.jobs, 6);
    assert_eq!(details.deadline, client.get_proposal(&id).deadline);
}

#[test]
fn test_voted_event() {
    let (env, client, _) = setup();
    let id = create(&env, &client, &Address::generate(&env), 100);
    let voter = Address::generate(&env);

    client.vote(&id, &voter, &false);

    let (topics, data) = &last_dao_events(&env, &client, 1)[0];
    let expected_topics = vec![
        &env,
        symbol_short!("voted").into_val(&env),
        id.into_val(&env),
    ];
    assert_eq!(*topics, expected_topics);
    let voted: Voted = data.try_into_val(&env).unwrap();
    assert_eq!(
        voted,
        Voted {
            id,
            voter,
            support: false,
        }
    );
}

#[test]
fn test_approved_event() {
    let (env, client, _) = setup();
    let id = create(&env, &client, &Address::generate(&env), 100);
    client.vote(&id, &Address::generate(&env), &true);
    let deadline = client.get_proposal(&id).deadline;
    env.ledger().with_mut(|li| li.timestamp = deadline + 1);

    client.finalize_proposal(&id);

    let (topics, data) = &last_dao_events(&env, &client, 1)[0];
    let expected_topics = vec![
        &env,
        symbol_short!("approved").into_val(&env),
        id.into_val(&env),
    ];
    assert_eq!(*topics, expected_topics);
    let approved: ProposalApproved = data.try_into_val(&env).unwrap();
    assert_eq!(approved, ProposalApproved { id });
}

#[test]
fn test_rejected_event() {
    let (env, client, _) = setup();
    let id = create(&env, &client, &Address::generate(&env), 100);
    let deadline = client.get_proposal(&id).deadline;
    env.ledger().with_mut(|li| li.timestamp = deadline + 1);

    client.finalize_proposal(&id);

    let (topics, data) = &last_dao_events(&env, &client, 1)[0];
    let expected_topics = vec![
        &env,
        symbol_short!("rejected").into_val(&env),
        id.into_val(&env),
    ];
    assert_eq!(*topics, expected_topics);
    let rejected: ProposalRejected = data.try_into_val(&env).unwrap();
    assert_eq!(rejected, ProposalRejected { id });
}

#[test]
fn test_deposit_and_released_events() {
    let (env, client, sac) = setup();
    let funder = Address::generate(&env);
    sac.mint(&funder, &5_000);
    client.deposit(&funder, &5_000);

    let (topics, data) = &last_dao_events(&env, &client, 1)[0];
    let expected_topics = vec![&env, symbol_short!("deposit").into_val(&env)];
    assert_eq!(*topics, expected_topics);
    let deposit: TreasuryDeposit = data.try_into_val(&env).unwrap();
    assert_eq!(
        deposit,
        TreasuryDeposit {
            from: funder,
            amount: 5_000,
        }
    );

    let id = create(&env, &client, &Address::generate(&env), 2_000);
    client.vote(&id, &Address::generate(&env), &true);
    let deadline = client.get_proposal(&id).deadline;
    env.ledger().with_mut(|li| li.timestamp = deadline + 1);
    client.finalize_proposal(&id);
    client.release_funds(&id);

    let (topics, data) = &last_dao_events(&env, &client, 1)[0];
    let expected_topics = vec![
        &env,
        symbol_short!("released").into_val(&env),
        id.into_val(&env),
    ];
    assert_eq!(*topics, expected_topics);
    let released: FundsReleased = data.try_into_val(&env).unwrap();
    assert_eq!(released, FundsReleased { id, amount: 2_000 });
}
