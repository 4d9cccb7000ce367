use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::sol;
use bigdecimal::BigDecimal;
use eyre::{bail, Result, WrapErr};

use crate::arb::price::{pow10, u256_to_decimal};

sol! {
    /// The ERC-20 reads needed before trading
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256 balance);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
    }
}

/// Converts raw token units into a human-scale amount.
///
/// # Errors
/// * If the units cannot be represented as a decimal
pub fn to_readable(units: U256, decimals: u8) -> Result<BigDecimal> {
    Ok(u256_to_decimal(units)? * pow10(-i64::from(decimals))?)
}

/// What the trading account holds of one token, and what the router may spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPosition {
    /// Token symbol, for messages
    pub token: String,
    /// Balance of the account
    pub balance: BigDecimal,
    /// Allowance granted to the router
    pub allowance: BigDecimal,
}

impl TokenPosition {
    /// Reads `owner`'s balance of `token` and its allowance to `spender`.
    ///
    /// # Errors
    /// * If either call fails
    pub async fn fetch<P: Provider>(
        provider: &P,
        token: Address,
        symbol: &str,
        decimals: u8,
        owner: Address,
        spender: Address,
    ) -> Result<Self> {
        let erc20 = IERC20::new(token, provider);
        let balance = erc20
            .balanceOf(owner)
            .call()
            .await
            .wrap_err_with(|| format!("balanceOf({owner}) on {symbol} {token}"))?
            .balance;
        let allowance = erc20
            .allowance(owner, spender)
            .call()
            .await
            .wrap_err_with(|| format!("allowance({owner}, {spender}) on {symbol} {token}"))?
            .remaining;

        Ok(Self {
            token: symbol.to_string(),
            balance: to_readable(balance, decimals)?,
            allowance: to_readable(allowance, decimals)?,
        })
    }

    /// Checks that a swap spending `required` of this token can go through.
    ///
    /// # Errors
    /// * If the balance or the router allowance is below `required`
    pub fn check_funding(&self, required: &BigDecimal) -> Result<()> {
        if &self.balance < required {
            bail!(
                "{} balance {} is below the {required} a trade spends",
                self.token,
                self.balance
            );
        }
        if &self.allowance < required {
            bail!(
                "router may spend {} {}, below the {required} a trade spends; approve the router first",
                self.allowance,
                self.token
            );
        }
        Ok(())
    }
}
