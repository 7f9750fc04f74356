#![allow(dead_code)]

use rustbreeze::core::{DataType, Result};
use rustbreeze::metadata::{
    DataProperty, EntityType, MetadataStore, NamingConvention, NavigationProperty,
};

/// Customer / Order / OrderDetail / Product with camelCase client names.
pub fn northwind() -> Result<MetadataStore> {
    let customer = EntityType::builder("Customer")
        .namespace("Northwind.Models")
        .resource_name("Customers")
        .data_property(DataProperty::new("customerID", DataType::Guid).key())
        .data_property(DataProperty::new("companyName", DataType::String).not_null())
        .data_property(DataProperty::new("city", DataType::String))
        .navigation_property(
            NavigationProperty::collection("orders", "Order").inverse_foreign_keys(["customerID"]),
        )
        .build()?;

    let order = EntityType::builder("Order")
        .namespace("Northwind.Models")
        .resource_name("Orders")
        .data_property(DataProperty::new("orderID", DataType::Int32).key())
        .data_property(DataProperty::new("customerID", DataType::Guid))
        .data_property(DataProperty::new("freight", DataType::Decimal))
        .data_property(DataProperty::new("shipCity", DataType::String))
        .data_property(DataProperty::new("orderDate", DataType::DateTime))
        .navigation_property(
            NavigationProperty::scalar("customer", "Customer").foreign_keys(["customerID"]),
        )
        .navigation_property(
            NavigationProperty::collection("orderDetails", "OrderDetail")
                .inverse_foreign_keys(["orderID"]),
        )
        .build()?;

    let detail = EntityType::builder("OrderDetail")
        .namespace("Northwind.Models")
        .resource_name("OrderDetails")
        .data_property(DataProperty::new("orderID", DataType::Int32).key())
        .data_property(DataProperty::new("productID", DataType::Int32).key())
        .data_property(DataProperty::new("unitPrice", DataType::Decimal))
        .data_property(DataProperty::new("quantity", DataType::Int16))
        .navigation_property(NavigationProperty::scalar("order", "Order").foreign_keys(["orderID"]))
        .navigation_property(
            NavigationProperty::scalar("product", "Product").foreign_keys(["productID"]),
        )
        .build()?;

    let product = EntityType::builder("Product")
        .namespace("Northwind.Models")
        .resource_name("Products")
        .data_property(DataProperty::new("productID", DataType::Int32).key())
        .data_property(DataProperty::new("productName", DataType::String))
        .build()?;

    MetadataStore::new()
        .with_naming_convention(NamingConvention::CamelCase)
        .with_entity_type(customer)?
        .with_entity_type(order)?
        .with_entity_type(detail)?
        .with_entity_type(product)
}
