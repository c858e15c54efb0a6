//! The customer session: menu, cart editing and checkout.

use std::io;

use cart::{
    Availability, AvailabilityResolver, Cart, CartChange, CartCommand, CartItem, Resolution,
};
use checkout::{
    CheckoutCoordinator, CheckoutError, CheckoutFailure, CheckoutOutcome, CheckoutReceipt,
};
use common::{ProductId, StockLot};
use gateway::{StockQuery, TransactionGateway};

use crate::error::SessionError;
use crate::prompt::Prompt;

/// Largest id the product prompt accepts.
const MAX_PRODUCT_ID: u32 = i32::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    AddProduct,
    EditCart,
    Checkout,
    Quit,
}

impl MenuAction {
    fn label(self) -> &'static str {
        match self {
            MenuAction::AddProduct => "Add a product to the cart",
            MenuAction::EditCart => "View or edit the cart",
            MenuAction::Checkout => "Check out",
            MenuAction::Quit => "Quit",
        }
    }

    /// Cart actions are only offered when there is something in the cart.
    fn available(cart: &Cart) -> &'static [MenuAction] {
        if cart.is_empty() {
            &[MenuAction::AddProduct, MenuAction::Quit]
        } else {
            &[
                MenuAction::AddProduct,
                MenuAction::EditCart,
                MenuAction::Checkout,
                MenuAction::Quit,
            ]
        }
    }
}

/// Returns the one-line cart summary shown under the main menu.
pub fn status_line(cart: &Cart) -> String {
    format!(
        "You have {} ({}) in your cart. Sub-total: {}.",
        plural(cart.product_count(), "product"),
        plural(cart.total_items() as usize, "item"),
        cart.total_price()
    )
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn render_cart(prompt: &mut impl Prompt, cart: &Cart) -> io::Result<()> {
    prompt.show(CartItem::HEADER)?;
    for item in cart.items() {
        prompt.show(&item.to_string())?;
    }
    prompt.show(&status_line(cart))
}

/// One customer building a cart and checking out.
pub struct Session<P, Q, G>
where
    P: Prompt,
    Q: StockQuery,
    G: TransactionGateway,
{
    prompt: P,
    resolver: AvailabilityResolver<Q>,
    coordinator: CheckoutCoordinator<G>,
    cart: Cart,
}

impl<P, Q, G> Session<P, Q, G>
where
    P: Prompt,
    Q: StockQuery,
    G: TransactionGateway,
{
    /// Starts a session with an empty cart.
    pub fn new(
        prompt: P,
        resolver: AvailabilityResolver<Q>,
        coordinator: CheckoutCoordinator<G>,
    ) -> Self {
        Self {
            prompt,
            resolver,
            coordinator,
            cart: Cart::new(),
        }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    /// Runs the main menu until the customer quits or input ends.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        tracing::info!("session started");
        loop {
            self.prompt.show("")?;
            if !self.cart.is_empty() {
                self.prompt.show(&status_line(&self.cart))?;
            }

            let actions = MenuAction::available(&self.cart);
            let labels: Vec<&str> = actions.iter().map(|a| a.label()).collect();
            let Some(choice) = self.prompt.choose("Main menu", &labels)? else {
                break;
            };

            match actions[choice] {
                MenuAction::AddProduct => self.add_product().await?,
                MenuAction::EditCart => self.edit_cart()?,
                MenuAction::Checkout => self.checkout().await?,
                MenuAction::Quit => break,
            }
        }

        self.prompt.show("Goodbye.")?;
        tracing::info!(products = self.cart.product_count(), "session ended");
        Ok(())
    }

    async fn add_product(&mut self) -> Result<(), SessionError> {
        let Some(raw) = self.prompt.read_int("Product id", 1, MAX_PRODUCT_ID)? else {
            return Ok(());
        };
        // Bounded by MAX_PRODUCT_ID.
        self.select_product(ProductId::new(raw as i32)).await
    }

    /// Handles the customer picking a product.
    ///
    /// A product already in the cart goes straight to the quantity edit;
    /// otherwise its stock is shown and a quantity requested.
    pub async fn select_product(&mut self, product_id: ProductId) -> Result<(), SessionError> {
        let resolution = match self.resolver.resolve(&self.cart, product_id).await {
            Ok(resolution) => resolution,
            Err(error) => {
                tracing::warn!(%product_id, %error, "stock lookup failed");
                self.prompt
                    .show(&format!("Could not look up product {product_id}: {error}"))?;
                return Ok(());
            }
        };

        match resolution {
            Resolution::InCart(item) => {
                self.prompt.show(&format!(
                    "{} is already in your cart.",
                    item.product_name()
                ))?;
                self.edit_item(&item)
            }
            Resolution::OutOfStock { product_id } => {
                self.prompt
                    .show(&format!("Product {product_id} is out of stock."))?;
                Ok(())
            }
            Resolution::Available(availability) => self.request_quantity(&availability),
        }
    }

    fn request_quantity(&mut self, availability: &Availability) -> Result<(), SessionError> {
        let preview = self.resolver.preview(availability);
        self.prompt.show(StockLot::HEADER)?;
        for lot in preview {
            self.prompt.show(&lot.to_string())?;
        }
        let hidden = availability.lots().len() - preview.len();
        if hidden > 0 {
            self.prompt
                .show(&format!("... and {}", plural(hidden, "more lot")))?;
        }
        self.prompt.show(&format!(
            "{} available at a guaranteed price of {} each.",
            availability.total_available(),
            availability.guaranteed_price()
        ))?;

        let Some(quantity) = self.prompt.read_int(
            "Quantity (0 to cancel)",
            0,
            availability.total_available(),
        )?
        else {
            return Ok(());
        };

        match availability.propose(quantity) {
            Ok(Some(item)) => {
                let name = item.product_name().to_string();
                match self.cart.apply(CartCommand::add(item)) {
                    Ok(_) => self
                        .prompt
                        .show(&format!("Added {name} (quantity {quantity}) to your cart."))?,
                    Err(error) => self.prompt.show(&error.to_string())?,
                }
            }
            Ok(None) => self.prompt.show("Nothing added.")?,
            Err(error) => self.prompt.show(&error.to_string())?,
        }
        Ok(())
    }

    fn edit_cart(&mut self) -> Result<(), SessionError> {
        render_cart(&mut self.prompt, &self.cart)?;

        let mut labels: Vec<&str> = self
            .cart
            .items()
            .iter()
            .map(CartItem::product_name)
            .collect();
        labels.push("Back");
        let Some(choice) = self.prompt.choose("Edit which item?", &labels)? else {
            return Ok(());
        };

        match self.cart.items().get(choice).cloned() {
            Some(item) => self.edit_item(&item),
            None => Ok(()),
        }
    }

    fn edit_item(&mut self, item: &CartItem) -> Result<(), SessionError> {
        self.prompt.show(CartItem::HEADER)?;
        self.prompt.show(&item.to_string())?;

        let Some(quantity) = self.prompt.read_int(
            "New quantity (0 removes)",
            0,
            item.max_quantity(),
        )?
        else {
            return Ok(());
        };

        let message = match self.cart.apply(CartCommand::edit(item.product_id(), quantity)) {
            Ok(CartChange::Updated { to, .. }) => {
                format!("{} quantity set to {to}.", item.product_name())
            }
            Ok(CartChange::Removed { .. }) => {
                format!("Removed {} from your cart.", item.product_name())
            }
            Ok(CartChange::Added { .. }) => format!("Added {}.", item.product_name()),
            Err(error) => error.to_string(),
        };
        self.prompt.show(&message)?;
        Ok(())
    }

    async fn checkout(&mut self) -> Result<(), SessionError> {
        let prompt = &mut self.prompt;
        let mut confirm_error = None;

        let result = self
            .coordinator
            .checkout(&mut self.cart, |cart| {
                let answer = render_cart(prompt, cart)
                    .and_then(|()| prompt.confirm("Purchase these items?"));
                answer.unwrap_or_else(|error| {
                    confirm_error = Some(error);
                    false
                })
            })
            .await;

        if let Some(error) = confirm_error {
            return Err(error.into());
        }

        match result {
            Ok(CheckoutOutcome::Committed(receipt)) => self.show_receipt(&receipt)?,
            Ok(CheckoutOutcome::Declined) => {
                self.prompt.show("Checkout cancelled. Your cart has been kept.")?
            }
            Ok(CheckoutOutcome::Failed(failure)) => self.show_failure(&failure)?,
            Err(CheckoutError::EmptyCart) => self.prompt.show("Your cart is empty.")?,
        }
        Ok(())
    }

    fn show_receipt(&mut self, receipt: &CheckoutReceipt) -> io::Result<()> {
        for line in &receipt.lines {
            self.prompt.show(&line.to_string())?;
        }
        if let Some(error) = &receipt.interrupted_by {
            self.prompt
                .show(&format!("Some items were skipped: {error}"))?;
        }
        self.prompt.show(&format!(
            "Purchase complete (transaction {}): {} for a total of {}.",
            receipt.transaction_id,
            plural(receipt.total_fulfilled as usize, "item"),
            receipt.final_total
        ))
    }

    fn show_failure(&mut self, failure: &CheckoutFailure) -> io::Result<()> {
        self.prompt
            .show(&format!("Sorry, {}. Your cart has been kept.", failure.kind))?;
        if let Some(cause) = &failure.cause {
            self.prompt.show(&format!("Reason: {cause}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::Money;

    use super::*;

    #[test]
    fn test_empty_cart_only_offers_add_and_quit() {
        assert_eq!(
            MenuAction::available(&Cart::new()),
            &[MenuAction::AddProduct, MenuAction::Quit]
        );
    }

    #[test]
    fn test_cart_actions_offered_once_filled() {
        let mut cart = Cart::new();
        cart.add_or_merge(CartItem::new(1, "Widget", 1, Money::from_cents(100), 3).unwrap())
            .unwrap();

        let actions = MenuAction::available(&cart);

        assert_eq!(actions.len(), 4);
        assert!(actions.contains(&MenuAction::Checkout));
        assert_eq!(actions[3], MenuAction::Quit);
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "item"), "1 item");
        assert_eq!(plural(0, "item"), "0 items");
        assert_eq!(plural(3, "more lot"), "3 more lots");
    }

    #[test]
    fn test_status_line_singular() {
        let mut cart = Cart::new();
        cart.add_or_merge(CartItem::new(1, "Widget", 1, Money::from_cents(250), 3).unwrap())
            .unwrap();

        assert_eq!(
            status_line(&cart),
            "You have 1 product (1 item) in your cart. Sub-total: $2.50."
        );
    }
}
