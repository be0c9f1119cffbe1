//! Treasury accessor: the DAO's balance is whatever the contract holds of
//! the configured token.

use soroban_sdk::{panic_with_error, token, Address, Env};

use crate::events;
use crate::storage;
use crate::Error;

fn token_client(env: &Env) -> token::Client<'_> {
    let token = match storage::get_token(env) {
        Some(token) => token,
        None => panic_with_error!(env, Error::NotInitialized),
    };
    token::Client::new(env, &token)
}

/// Current holdable balance, as of the executing ledger.
pub fn balance(env: &Env) -> i128 {
    token_client(env).balance(&env.current_contract_address())
}

/// Move `amount` from `from` into the treasury.
pub fn deposit(env: &Env, from: &Address, amount: i128) {
    if amount <= 0 {
        panic_with_error!(env, Error::InvalidAmount);
    }
    token_client(env).transfer(from, &env.current_contract_address(), &amount);
    events::emit_deposit(env, from, amount);
}

/// Pay `amount` out of the treasury to `to`.
///
/// Fails with `InsufficientTreasury` instead of letting the token contract trap.
pub fn pay_out(env: &Env, to: &Address, amount: i128) {
    let client = token_client(env);
    let contract = env.current_contract_address();
    if client.balance(&contract) < amount {
        panic_with_error!(env, Error::InsufficientTreasury);
    }
    if amount > 0 {
        client.transfer(&contract, to, &amount);
    }
}
