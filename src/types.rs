/// Raw key identifying one object in remote storage.
/// Example: `my_base_directory/alpha/files/go/here/alpha-202001.csv`
pub type DataReference = String;
/// Name of a logical data asset declared on a connector.
/// Examples: `alpha`, `TestFiles`
pub type AssetName = String;
/// Label bound to one regex capturing group.
/// Examples: `name`, `timestamp`, `price`
pub type GroupName = String;
/// Value captured by one regex group from a reference.
/// Examples: `alex`, `20200809`, `1000`
pub type GroupValue = String;
/// Name of a data connector instance.
/// Example: `general_azure_data_connector`
pub type ConnectorName = String;
/// Name of the datasource that owns a connector.
/// Example: `test_environment`
pub type DatasourceName = String;
/// Storage container (bucket) that references are listed from.
/// Example: `my_container`
pub type ContainerName = String;
