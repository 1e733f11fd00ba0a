//! Balance [`Statement`] derivation of a [`Contract`].

use common::Money;
use rust_decimal::Decimal;

use crate::domain::{contract::Status, payment, Contract, Payment};

/// Derived financial state of a [`Contract`] at a point in its payment
/// history.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Statement {
    /// Total amount owed under the [`Contract`], the sum of its per-plot
    /// prices.
    pub total_owed: Money,

    /// Total amount paid: the initial deposit plus every approved
    /// [`Payment`].
    pub total_paid: Money,

    /// Outstanding balance, never negative.
    pub balance: Money,

    /// [`Status`] the [`Contract`] should carry: [`Status::Completed`] iff
    /// the balance is zero.
    pub status: Status,
}

impl Statement {
    /// Derives a [`Statement`] of the given [`Contract`] over the given
    /// [`Payment`] history.
    ///
    /// Only [`payment::Status::Approved`] rows belonging to the [`Contract`]
    /// count toward `total_paid`. Overpayments clamp the balance at zero.
    ///
    /// Pure: no I/O and no side effects. All amounts are summed in the
    /// [`Contract`]'s currency, which every command enforces on its inputs.
    #[must_use]
    pub fn derive<'p>(
        contract: &Contract,
        payments: impl IntoIterator<Item = &'p Payment>,
    ) -> Self {
        let currency = contract.currency();

        let total_owed = contract
            .plots
            .iter()
            .map(|p| p.price.amount)
            .sum::<Decimal>();

        let total_paid = contract.initial_deposit.amount
            + payments
                .into_iter()
                .filter(|p| {
                    p.contract_id == contract.id
                        && p.status == payment::Status::Approved
                })
                .map(|p| p.amount.amount)
                .sum::<Decimal>();

        let balance = (total_owed - total_paid).max(Decimal::ZERO);

        Self {
            total_owed: Money {
                amount: total_owed,
                currency,
            },
            total_paid: Money {
                amount: total_paid,
                currency,
            },
            balance: Money {
                amount: balance,
                currency,
            },
            status: if balance.is_zero() {
                Status::Completed
            } else {
                Status::Active
            },
        }
    }
}

#[cfg(test)]
mod spec {
    use common::{
        money::{Currency, Money},
        DateTime,
    };
    use rust_decimal::Decimal;

    use super::{Statement, Status};
    use crate::domain::{
        contract::{self, PlotPrice, Schedule},
        payment, plot, user, Contract, Payment,
    };

    fn ngn(amount: i64) -> Money {
        Money {
            amount: Decimal::from(amount),
            currency: Currency::Ngn,
        }
    }

    fn contract(prices: &[i64], deposit: i64) -> Contract {
        Contract {
            id: contract::Id::new(),
            buyer_id: user::Id::new(),
            plots: prices
                .iter()
                .map(|&p| PlotPrice {
                    plot_id: plot::Id::new(),
                    price: ngn(p),
                })
                .collect(),
            initial_deposit: ngn(deposit),
            schedule: Schedule::new("monthly").unwrap(),
            acquired_at: DateTime::now().coerce(),
            balance: ngn(0),
            status: Status::Active,
            created_at: DateTime::now().coerce(),
        }
    }

    fn payment(
        contract: &Contract,
        amount: i64,
        status: payment::Status,
    ) -> Payment {
        Payment {
            id: payment::Id::new(),
            contract_id: contract.id,
            plot_id: None,
            amount: ngn(amount),
            method: None,
            reference: None,
            document: None,
            note: None,
            recorded_by: None,
            idempotency_key: None,
            status,
            outstanding: None,
            received_at: DateTime::now().coerce(),
            decided_at: None,
            created_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn counts_deposit_against_total_owed() {
        let contract = contract(&[2_000_000], 500_000);

        let statement = Statement::derive(&contract, []);

        assert_eq!(statement.total_owed, ngn(2_000_000));
        assert_eq!(statement.total_paid, ngn(500_000));
        assert_eq!(statement.balance, ngn(1_500_000));
        assert_eq!(statement.status, Status::Active);
    }

    #[test]
    fn completes_on_exact_payoff() {
        let contract = contract(&[2_000_000], 500_000);
        let paid = payment(&contract, 1_500_000, payment::Status::Approved);

        let statement = Statement::derive(&contract, [&paid]);

        assert_eq!(statement.total_paid, ngn(2_000_000));
        assert_eq!(statement.balance, ngn(0));
        assert_eq!(statement.status, Status::Completed);
    }

    #[test]
    fn clamps_overpayment_at_zero() {
        let contract = contract(&[1_000_000], 0);
        let paid = payment(&contract, 1_700_000, payment::Status::Approved);

        let statement = Statement::derive(&contract, [&paid]);

        assert_eq!(statement.total_paid, ngn(1_700_000));
        assert_eq!(statement.balance, ngn(0));
        assert_eq!(statement.status, Status::Completed);
    }

    #[test]
    fn ignores_pending_and_rejected_rows() {
        let contract = contract(&[2_000_000], 500_000);
        let pending = payment(&contract, 700_000, payment::Status::Pending);
        let rejected = payment(&contract, 300_000, payment::Status::Rejected);

        let statement = Statement::derive(&contract, [&pending, &rejected]);

        assert_eq!(statement.total_paid, ngn(500_000));
        assert_eq!(statement.balance, ngn(1_500_000));
        assert_eq!(statement.status, Status::Active);
    }

    #[test]
    fn ignores_other_contracts_rows() {
        let contract = contract(&[2_000_000], 500_000);
        let other = self::contract(&[1_000_000], 0);
        let foreign = payment(&other, 1_500_000, payment::Status::Approved);

        let statement = Statement::derive(&contract, [&foreign]);

        assert_eq!(statement.balance, ngn(1_500_000));
        assert_eq!(statement.status, Status::Active);
    }

    #[test]
    fn sums_prices_of_all_plots() {
        let contract = contract(&[800_000, 700_000, 500_000], 500_000);

        let statement = Statement::derive(&contract, []);

        assert_eq!(statement.total_owed, ngn(2_000_000));
        assert_eq!(statement.balance, ngn(1_500_000));
    }

    #[test]
    fn reverts_to_active_when_history_shrinks() {
        let contract = contract(&[2_000_000], 500_000);
        let paid = payment(&contract, 1_500_000, payment::Status::Approved);

        let completed = Statement::derive(&contract, [&paid]);
        assert_eq!(completed.status, Status::Completed);

        let reverted = Statement::derive(&contract, []);
        assert_eq!(reverted.status, Status::Active);
        assert_eq!(reverted.balance, ngn(1_500_000));
    }

    #[test]
    fn balance_never_negative_and_monotone() {
        let contract = contract(&[2_000_000], 500_000);

        let mut history = Vec::new();
        let mut prev = Statement::derive(&contract, &history);
        for amount in [100_000, 700_000, 900_000, 250_000, 400_000] {
            history.push(payment(
                &contract,
                amount,
                payment::Status::Approved,
            ));
            let next = Statement::derive(&contract, &history);

            assert!(next.balance.amount >= Decimal::ZERO);
            assert!(next.balance.amount <= prev.balance.amount);
            assert!(next.total_paid.amount >= prev.total_paid.amount);

            prev = next;
        }

        assert_eq!(prev.balance, ngn(0));
        assert_eq!(prev.status, Status::Completed);
    }
}
