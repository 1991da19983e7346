pub mod maas;
